// # Registry Client Trait
//
// Defines the interface to the remote name registry.
//
// ## Implementations
//
// - JSON-RPC over HTTP: `lighthouse-registry-jsonrpc` crate
//
// ## Usage
//
// ```rust,ignore
// use lighthouse_core::RegistryClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let registry = /* RegistryClient implementation */;
//
//     for entry in registry.list_entries().await? {
//         let payload = registry.resolve(&entry.name).await?;
//         println!("{} -> {}", entry.name, payload);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::TrieEntry;

/// Trait for registry client implementations
///
/// # Trust Level: Untrusted
///
/// Registry clients are thin transports:
///
/// ## Allowed Capabilities
/// - ✅ One request/response round trip per call
/// - ✅ Decode the registry's wire format into [`TrieEntry`] / raw JSON
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the next timer tick is the retry)
/// - ❌ Cache listings or payloads (the reconciler owns the cache)
/// - ❌ Validate names or metadata (owned by the validators)
/// - ❌ Spawn tasks
///
/// The reconciler wraps every call in its own timeout, but clients should
/// still bound their transport so a dropped future does not leak a socket.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List every claim currently in the name trie
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<TrieEntry>)`: The listing, in registry order
    /// - `Err(Error)`: The registry could not be listed; the cycle is skipped
    async fn list_entries(&self) -> Result<Vec<TrieEntry>, crate::Error>;

    /// Resolve the raw metadata payload published under `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The unvalidated payload
    /// - `Err(Error)`: Resolution failed; the claim will be quarantined
    async fn resolve(&self, name: &str) -> Result<serde_json::Value, crate::Error>;

    /// Client name for logging
    fn client_name(&self) -> &'static str;
}
