use crate::config::MonitorConfig;

pub fn run(config: MonitorConfig) {
    let rt = super::runtime();
    let mut app = crate::tui::app::App::new(&config, rt.handle().clone());
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
