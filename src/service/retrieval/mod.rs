//! Reference documents for the general support fallback.

use std::{collections::HashSet, ops::Deref, path::Path, sync::Arc};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::base::types::{Document, Res};

// Traits.

/// Generic retriever trait that document sources must implement.
#[async_trait]
pub trait GenericRetriever: Send + Sync + 'static {
    /// Get up to `limit` documents relevant to the question, best first.
    async fn retrieve(&self, question: &str, limit: usize) -> Res<Vec<Document>>;
}

// Structs.

/// Retriever for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Retriever {
    inner: Arc<dyn GenericRetriever>,
}

impl Deref for Retriever {
    type Target = dyn GenericRetriever;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Retriever {
    pub fn new(inner: Arc<dyn GenericRetriever>) -> Self {
        Self { inner }
    }

    /// Keyword retriever over the `*.txt` files of a folder.
    pub fn keyword_from_folder(path: impl AsRef<Path>) -> Res<Self> {
        Ok(Self::new(Arc::new(KeywordRetriever::from_folder(path)?)))
    }
}

// Specific implementations.

/// Ranks documents by how many distinct question terms they contain.
pub struct KeywordRetriever {
    documents: Vec<IndexedDocument>,
}

struct IndexedDocument {
    document: Document,
    terms: HashSet<String>,
}

impl KeywordRetriever {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let documents = documents
            .into_iter()
            .map(|document| IndexedDocument {
                terms: terms(&document.content),
                document,
            })
            .collect();

        Self { documents }
    }

    /// Load every `*.txt` file of a folder; a missing folder yields no documents.
    #[instrument(name = "KeywordRetriever::from_folder", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_folder(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();

        if !path.is_dir() {
            warn!("Documents folder not found; the support fallback will run without reference documents.");
            return Ok(Self::from_documents(Vec::new()));
        }

        let pattern = path.join("*.txt");
        let pattern = pattern.to_str().ok_or_else(|| anyhow::anyhow!("Documents path is not valid UTF-8."))?;

        let mut documents = Vec::new();

        for entry in glob::glob(pattern)? {
            let file = entry?;
            let content = std::fs::read_to_string(&file)?;

            documents.push(Document {
                source: file.display().to_string(),
                content,
            });
        }

        documents.sort_by(|a, b| a.source.cmp(&b.source));

        info!("Loaded {} reference documents.", documents.len());

        Ok(Self::from_documents(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl GenericRetriever for KeywordRetriever {
    async fn retrieve(&self, question: &str, limit: usize) -> Res<Vec<Document>> {
        let question_terms = terms(question);

        let mut scored: Vec<(usize, &IndexedDocument)> = self
            .documents
            .iter()
            .map(|d| (d.terms.intersection(&question_terms).count(), d))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps folder order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().take(limit).map(|(_, d)| d.document.clone()).collect())
    }
}

/// Lowercased words of three or more characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

// Tests.
