use crate::error::CaptionError;
use crate::models::caption_types::InstructionProfile;
use crate::services::captioner::capability::Captioner;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(CaptionError),
    /// Sleep past any reasonable test timeout.
    Hang,
    /// Hang for the first `n` calls, then answer.
    HangThenText(u32, String),
}

/// Scripted captioner keyed by image file name. Unscripted images get
/// `"caption for <file name>"`.
#[derive(Default)]
pub struct MockCaptioner {
    replies: HashMap<String, MockReply>,
    unavailable: Option<String>,
    calls: Mutex<Vec<String>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl MockCaptioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, file_name: &str, reply: MockReply) -> Self {
        self.replies.insert(file_name.to_string(), reply);
        self
    }

    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    /// File names in the order calls started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Captioner for MockCaptioner {
    async fn check_available(&self) -> Result<(), CaptionError> {
        match &self.unavailable {
            Some(reason) => Err(CaptionError::ModelUnavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn caption(&self, image: &Path, _profile: InstructionProfile) -> Result<String, CaptionError> {
        let name = image
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(name.clone()).or_insert(0);
            *n += 1;
            *n
        };

        match self.replies.get(&name).cloned() {
            Some(MockReply::Text(t)) => Ok(t),
            Some(MockReply::Fail(e)) => Err(e),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(CaptionError::Generation("hang elapsed".into()))
            }
            Some(MockReply::HangThenText(n, t)) => {
                if attempt <= n {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(t)
            }
            None => Ok(format!("caption for {}", name)),
        }
    }
}
