use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStage {
    Http,
    Parse,
    Contract,
}

impl FeedStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedStage::Http => "http",
            FeedStage::Parse => "parse",
            FeedStage::Contract => "contract",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedError {
    pub stage: FeedStage,
    pub endpoint: String,
    pub detail: String,
    pub raw_body: Option<String>,
}

impl FeedError {
    pub fn new(stage: FeedStage, endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            stage,
            endpoint: endpoint.into(),
            detail: detail.into(),
            raw_body: None,
        }
    }

    pub fn with_raw_body(mut self, body: impl Into<String>) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    /// Transport and upstream HTTP failures; everything else means the document was bad.
    pub fn is_upstream_unavailable(&self) -> bool {
        self.stage == FeedStage::Http
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate feed error (endpoint={}, stage={}): {}",
            self.endpoint,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for FeedError {}
