//! Startup demonstration run by the binary.

use tracing::info;

use crate::error::Result;
use crate::facade::Facade;

/// List written and read back by [`run_demo`].
pub const DEMO_LIST: &str = "hello";

/// Values appended to [`DEMO_LIST`].
pub const DEMO_VALUES: [&str; 3] = ["word1", "word2", "word3"];

/// Appends the demo values to the demo list and reads the whole list back.
pub async fn run_demo(facade: &Facade) -> Result<Vec<String>> {
    facade.add_list(DEMO_LIST, DEMO_VALUES).await?;
    let values: Vec<String> = facade.get_list(DEMO_LIST).await?;
    info!("List {} holds {} values", DEMO_LIST, values.len());
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_demo_reads_back_list() {
        let facade = Facade::new(Arc::new(MemoryStore::new()));

        let values = run_demo(&facade).await.unwrap();
        assert_eq!(values, DEMO_VALUES);
    }

    #[tokio::test]
    async fn test_run_demo_appends() {
        let facade = Facade::new(Arc::new(MemoryStore::new()));

        run_demo(&facade).await.unwrap();
        let values = run_demo(&facade).await.unwrap();
        assert_eq!(values.len(), DEMO_VALUES.len() * 2);
    }
}
