/*!
# grepd engine

Concurrent substring search over a fixed directory of text documents.

The file set is enumerated once at construction and never refreshed. Each
search fans per-file scans out across a bounded number of workers and merges
the per-line matches into a single result collection. Cancellation is
cooperative: it stops new files from being dispatched but lets granted
workers run to completion.

## Example

```rust,no_run
use grepd_engine::{DirSearcher, EngineConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let searcher = DirSearcher::new(EngineConfig {
        root_dir: "data".into(),
        ..Default::default()
    })?;

    let matches = searcher.search("hello", &CancellationToken::new()).await;
    println!("{} matching lines", matches.len());
    Ok(())
}
```
*/

mod config;
mod error;
mod matcher;
mod searcher;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use matcher::{Match, match_lines, match_lines_regex};
pub use searcher::{DirSearcher, DocumentStore, Search};
