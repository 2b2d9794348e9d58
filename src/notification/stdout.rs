//! A notifier that prints events instead of posting them.

use async_trait::async_trait;

use super::{Notifier, NotifierError};
use crate::models::{Activity, CollectionConfig};

/// Writes each emitted event to standard output as one JSON line. Used by
/// dry runs.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(
        &self,
        collection: &CollectionConfig,
        activity: &Activity,
    ) -> Result<(), NotifierError> {
        let line = serde_json::json!({
            "collection": collection.name,
            "activity": activity,
        });
        println!("{line}");
        Ok(())
    }
}
