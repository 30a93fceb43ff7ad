//! Error types and handling for the flight-finder application

use thiserror::Error;

/// Main error type for the flight-finder application
#[derive(Error, Debug)]
pub enum FlightFinderError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Pricing API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors (travelers, dates, CLI arguments)
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The candidate location list could not be loaded or saved
    #[error("Location catalog error: {message}")]
    Location { message: String },

    /// Result files could not be written or read back
    #[error("Results error: {message}")]
    Results { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl FlightFinderError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new location catalog error
    pub fn location<S: Into<String>>(message: S) -> Self {
        Self::Location {
            message: message.into(),
        }
    }

    /// Create a new results error
    pub fn results<S: Into<String>>(message: S) -> Self {
        Self::Results {
            message: message.into(),
        }
    }


    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            FlightFinderError::Config { .. } => {
                "Configuration error. Please check your config file and API key.".to_string()
            }
            FlightFinderError::Api { .. } => {
                "Unable to reach the flight pricing service. Please check your internet connection."
                    .to_string()
            }
            FlightFinderError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            FlightFinderError::Location { message } => {
                format!("Could not load candidate locations: {message}")
            }
            FlightFinderError::Results { .. } => {
                "Could not read or write result files. Please check file permissions.".to_string()
            }
            FlightFinderError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = FlightFinderError::config("missing API key");
        assert!(matches!(config_err, FlightFinderError::Config { .. }));

        let api_err = FlightFinderError::api("connection failed");
        assert!(matches!(api_err, FlightFinderError::Api { .. }));

        let validation_err = FlightFinderError::validation("duplicate traveler");
        assert!(matches!(validation_err, FlightFinderError::Validation { .. }));

        let location_err = FlightFinderError::location("airports.json missing");
        assert!(matches!(location_err, FlightFinderError::Location { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = FlightFinderError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let api_err = FlightFinderError::api("test");
        assert!(api_err.user_message().contains("Unable to reach"));

        let validation_err = FlightFinderError::validation("bad date");
        assert!(validation_err.user_message().contains("bad date"));

        let location_err = FlightFinderError::location("no such file");
        assert!(location_err.user_message().contains("no such file"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FlightFinderError = io_err.into();
        assert!(matches!(err, FlightFinderError::Io { .. }));
    }
}
