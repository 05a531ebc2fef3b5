pub fn generate_starter_settings() -> String {
    r#"# =============================================================================
# TSP-MYSQL SETTINGS
# =============================================================================
# Optional settings for the transactions-to-metrics extraction job. Every key
# has a default, so this file may be omitted entirely.
#
# Database access and the application id always come from the environment:
#   DB_HOST, DB_USER, DB_PASSWORD, DB_DATABASE, TSI_APP_ID
# Metrics API credentials likewise:
#   TSP_EMAIL, TSP_API_TOKEN, TSP_API_HOST (optional)
#
# Values may reference environment variables with $env{NAME}.
#
# Settings file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/tsp-mysql/config.yml
#   3. /etc/tsp-mysql/config.yml

# =============================================================================
# STATE
# =============================================================================
# Both files are only touched while the run lock is held.

state:
  # Lock file preventing overlapping runs. Content is irrelevant.
  lock_file: etl.lock
  # Timestamp of the last extracted row, rewritten after every successful run.
  last_record_file: etl.last

# =============================================================================
# DELIVERY
# =============================================================================

delivery:
  # Measurements per API call. The last batch of a run may be smaller.
  batch_size: 10
  # Per-request timeout for the metrics API
  timeout: 30s

# =============================================================================
# MEASUREMENT
# =============================================================================

measurement:
  # Source identifier attached to every measurement
  source: littledog.com
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_settings;
    use std::path::PathBuf;

    #[test]
    fn test_starter_settings_parse_to_defaults() {
        let settings = parse_settings(&generate_starter_settings()).unwrap();
        let defaults = crate::config::Settings::default();

        assert_eq!(settings.state.lock_file, PathBuf::from("etl.lock"));
        assert_eq!(settings.state.last_record_file, defaults.state.last_record_file);
        assert_eq!(settings.delivery.batch_size, defaults.delivery.batch_size);
        assert_eq!(settings.delivery.timeout, defaults.delivery.timeout);
        assert_eq!(settings.measurement.source, defaults.measurement.source);
    }
}
