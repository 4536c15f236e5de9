// src/seed.rs

//! Startup loading of quiz documents into the catalog.

use std::path::Path;

use crate::{
    models::quiz::Quiz,
    store::{QuizCatalog, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("cannot read quiz directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Loads every `*.json` file in `dir` as a quiz and writes it to the catalog.
///
/// Files that fail to parse are skipped with a warning. Returns how many
/// quizzes were stored.
pub async fn seed_quizzes(catalog: &dyn QuizCatalog, dir: &Path) -> Result<usize, SeedError> {
    let io_err = |source: std::io::Error| SeedError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let quiz: Quiz = match serde_json::from_slice(&raw) {
            Ok(quiz) => quiz,
            Err(e) => {
                tracing::warn!("Skipping {}: not a quiz document ({})", path.display(), e);
                continue;
            }
        };

        catalog.put_quiz(&quiz).await?;
        tracing::info!(
            "Seeded quiz {} ({} questions) from {}",
            quiz.quiz_id,
            quiz.question_count(),
            path.display()
        );
        loaded += 1;
    }

    Ok(loaded)
}
