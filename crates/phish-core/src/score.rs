//! URL scoring against a loaded model.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::features::UrlInput;
use crate::model::PhishingModel;
use crate::report::CheckResult;

/// Display label for a single URL: `"Phishing 🚨"` or `"Safe ✅"`.
pub fn check_url(model: &PhishingModel, url: &str) -> &'static str {
    model.classify(&UrlInput::from(url)).display()
}

/// Load the model at `model_path` and score one URL.
pub fn score_url(model_path: &Path, url: &str) -> Result<&'static str> {
    let model = PhishingModel::load(model_path)?;
    Ok(check_url(&model, url))
}

/// Score each URL in order.
pub fn check_urls<S: AsRef<str>>(model: &PhishingModel, urls: &[S]) -> Vec<CheckResult> {
    urls.iter()
        .map(|url| {
            let url = url.as_ref();
            let label = model.classify(&UrlInput::from(url));
            debug!(url, label = label.display(), "scored");
            CheckResult {
                url: url.to_string(),
                label,
                verdict: label.display().to_string(),
            }
        })
        .collect()
}
