use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Famicitas";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is not set
pub fn default_log_filter() -> String {
    "info,famicitas_core=debug".to_string()
}

/// Get the application data directory
/// ~/Famicitas/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Famicitas")
}

/// Get the default database path
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("famicitas.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Famicitas"));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = default_database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("famicitas.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
