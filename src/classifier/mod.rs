//! Optional classifier collaborator used to narrow candidate pools by label.

mod http_client;
mod trait_def;

pub use http_client::HttpClassifierClient;
#[cfg(feature = "mock")]
pub use trait_def::MockClassifier;
pub use trait_def::{Classifier, ClassifierError};
