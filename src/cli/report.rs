use std::{fmt, str::FromStr};

use crate::{ca::CertificateAuthority, preflight::NodeOverview};

//------------ ReportFormat --------------------------------------------------

/// The format used to show the outcome of a command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportFormat {
    None,
    Json,
    Text,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, ReportError> {
        match s {
            "none" => Ok(ReportFormat::None),
            "json" => Ok(ReportFormat::Json),
            "text" => Ok(ReportFormat::Text),
            _ => Err(ReportError::UnrecognisedFormat(s.to_string())),
        }
    }
}

//------------ ReportError ---------------------------------------------------

#[derive(Debug)]
pub enum ReportError {
    UnrecognisedFormat(String),
    Json(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReportError::UnrecognisedFormat(s) => write!(f, "This report format is not recognised: {}", s),
            ReportError::Json(e) => write!(f, "Cannot produce JSON report: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Json(e)
    }
}

//------------ Report --------------------------------------------------------

/// The outcome of a command.
#[derive(Clone, Debug)]
pub enum Report {
    CertificateAuthority(CertificateAuthority),
    Pem(String),
    Nodes(Vec<NodeOverview>),
    Success(String),
}

impl Report {
    /// Formats the report. Returns `None` if there is nothing to show.
    pub fn report(&self, format: ReportFormat) -> Result<Option<String>, ReportError> {
        match format {
            ReportFormat::None => Ok(None),
            ReportFormat::Json => self.json().map(Some),
            ReportFormat::Text => Ok(Some(self.text())),
        }
    }

    fn json(&self) -> Result<String, ReportError> {
        let json = match self {
            Report::CertificateAuthority(ca) => serde_json::to_string_pretty(ca)?,
            Report::Pem(pem) => serde_json::to_string_pretty(&serde_json::json!({ "pem": pem }))?,
            Report::Nodes(nodes) => serde_json::to_string_pretty(nodes)?,
            Report::Success(msg) => serde_json::to_string_pretty(&serde_json::json!({ "result": msg }))?,
        };
        Ok(json)
    }

    fn text(&self) -> String {
        match self {
            Report::CertificateAuthority(ca) => format!("{}: {}", ca.source(), ca.identity()),
            Report::Pem(pem) => pem.trim_end().to_string(),
            Report::Nodes(nodes) => {
                let mut res = String::new();
                for node in nodes {
                    let state = node.state.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
                    res.push_str(&format!(
                        "{} {} {} {} {}",
                        node.short_id, node.hostname, node.transport_address, node.live_status, state
                    ));
                    if let Some(msg) = &node.error_message {
                        res.push_str(&format!(" ({})", msg));
                    }
                    res.push('\n');
                }
                res.trim_end().to_string()
            }
            Report::Success(msg) => msg.clone(),
        }
    }
}
