extern crate anyhow;
extern crate flexi_logger;
extern crate image;
extern crate reqwest;
extern crate serde_json;
extern crate std;

pub type DlrMapResult<T> = std::result::Result<T, DlrMapError>;

#[derive(Debug)]
pub enum DlrMapError {
    HttpError(reqwest::Error),
    ImageError(image::ImageError),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    LoggerError(flexi_logger::FlexiLoggerError),
    OtherError(anyhow::Error),
}

pub fn make_error(msg: &str) -> DlrMapError {
    return DlrMapError::OtherError(anyhow::anyhow!(msg.to_string()));
}

impl std::fmt::Display for DlrMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            DlrMapError::HttpError(ref err) => {
                return write!(f, "HTTP Error: {}", err);
            },
            DlrMapError::ImageError(ref err) => {
                return write!(f, "Image Error: {}", err);
            },
            DlrMapError::IoError(ref err) => {
                return write!(f, "IO Error: {}", err);
            },
            DlrMapError::JsonError(ref err) => {
                return write!(f, "JSON Error: {}", err);
            },
            DlrMapError::LoggerError(ref err) => {
                return write!(f, "Logger Error: {}", err);
            },
            DlrMapError::OtherError(ref err) => {
                // {:#} keeps the anyhow context chain on one line.
                return write!(f, "Error: {:#}", err);
            },
        }
    }
}

impl std::error::Error for DlrMapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            DlrMapError::HttpError(ref err) => Some(err),
            DlrMapError::ImageError(ref err) => Some(err),
            DlrMapError::IoError(ref err) => Some(err),
            DlrMapError::JsonError(ref err) => Some(err),
            DlrMapError::LoggerError(ref err) => Some(err),
            DlrMapError::OtherError(ref err) => Some(&**err),
        }
    }
}

impl From<reqwest::Error> for DlrMapError {
    fn from(err: reqwest::Error) -> DlrMapError {
        return DlrMapError::HttpError(err);
    }
}

impl From<image::ImageError> for DlrMapError {
    fn from(err: image::ImageError) -> DlrMapError {
        return DlrMapError::ImageError(err);
    }
}

impl From<std::io::Error> for DlrMapError {
    fn from(err: std::io::Error) -> DlrMapError {
        return DlrMapError::IoError(err);
    }
}

impl From<serde_json::Error> for DlrMapError {
    fn from(err: serde_json::Error) -> DlrMapError {
        return DlrMapError::JsonError(err);
    }
}

impl From<flexi_logger::FlexiLoggerError> for DlrMapError {
    fn from(err: flexi_logger::FlexiLoggerError) -> DlrMapError {
        return DlrMapError::LoggerError(err);
    }
}

impl From<anyhow::Error> for DlrMapError {
    fn from(err: anyhow::Error) -> DlrMapError {
        return DlrMapError::OtherError(err);
    }
}
