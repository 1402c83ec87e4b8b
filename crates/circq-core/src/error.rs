use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircqError {
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Core {core} out of range ({available} cores online)")]
    CoreOutOfRange { core: usize, available: usize },

    #[error("Failed to pin thread to core {core}: {source}")]
    Affinity {
        core: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, CircqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let out_of_range = CircqError::CoreOutOfRange { core: 9, available: 4 };
        assert_eq!(out_of_range.to_string(), "Core 9 out of range (4 cores online)");

        let pin = CircqError::Affinity {
            core: 1,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad cpu mask"),
        };
        assert!(pin.to_string().starts_with("Failed to pin thread to core 1"));
        assert!(std::error::Error::source(&pin).is_some());

        let unsupported = CircqError::Unsupported("thread affinity".into());
        assert!(unsupported.to_string().contains("thread affinity"));
    }
}
