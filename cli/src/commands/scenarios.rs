use incidentops_core::api::ScenarioCatalog;

/// One line per scenario: name, step count, total playback seconds.
pub fn render_table(catalog: &ScenarioCatalog) -> String {
    let width = catalog.names().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    for (name, def) in catalog.iter() {
        out.push_str(&format!(
            "{name:<width$}  {:>2} steps  {:>5.1}s\n",
            def.len(),
            def.total_duration().as_secs_f64(),
        ));
    }
    out
}

pub fn handle_scenarios() -> i32 {
    print!("{}", render_table(ScenarioCatalog::builtin()));
    0
}
