//! High-level import service tying decoding, reduction and reconciliation together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use encoding_rs::Encoding;
use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::correction::CorrectionQueue;
use crate::duplicates::detect_duplicates;
use crate::model::{CanonicalEntry, DuplicateReport, ImportSummary, InvalidRow, SourceKind};
use crate::plugin::SourceRegistry;
use crate::ports::{AddressStore, StoreError};
use crate::reconcile::reconcile;
use crate::text::{DecodeError, decode, encoding_for_label, tokenize};

#[derive(thiserror::Error, Debug)]
/// Errors that abort an import run.
pub enum ImportError {
    /// A registry file could not be decoded.
    #[error("{kind} registry: {error}")]
    Decode {
        /// Registry whose file failed.
        kind: SourceKind,
        /// Underlying decode failure.
        error: DecodeError,
    },
    /// The configured fallback encoding is unknown.
    #[error("Invalid import configuration: {0}")]
    Encoding(DecodeError),
    /// The import settings are invalid.
    #[error("Invalid import configuration: {0}")]
    Config(String),
    /// No reducer is registered for a supplied file.
    #[error("No reducer registered for the {0} registry")]
    MissingSource(SourceKind),
    /// Another import is in progress.
    #[error("An import is already running")]
    AlreadyRunning,
    /// The address store failed; the run stopped at that point.
    #[error(
        "Address store unavailable: {0}. Re-run the import; addresses created before the failure will be skipped."
    )]
    StoreUnavailable(#[from] StoreError),
}

/// One registry file handed to an import run.
#[derive(Debug, Clone, Copy)]
pub struct RegistryFile<'a> {
    /// Registry schema of the file.
    pub kind: SourceKind,
    /// Raw file contents.
    pub bytes: &'a [u8],
}

impl<'a> RegistryFile<'a> {
    /// Commercial registry contents.
    #[must_use]
    pub fn commercial(bytes: &'a [u8]) -> Self {
        Self {
            kind: SourceKind::Commercial,
            bytes,
        }
    }

    /// Residential registry contents.
    #[must_use]
    pub fn residential(bytes: &'a [u8]) -> Self {
        Self {
            kind: SourceKind::Residential,
            bytes,
        }
    }
}

/// Store-independent result of reducing registry files.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Data rows read across all files.
    pub total_rows_seen: usize,
    /// Merged entries, commercial before residential in file order.
    pub entries: Vec<CanonicalEntry>,
    /// Every duplicate report, uncapped.
    pub duplicates: Vec<DuplicateReport>,
    /// Rejected rows in file order.
    pub invalid_rows: Vec<InvalidRow>,
}

/// Summary of a finished run plus the queue of rows to correct.
#[derive(Debug)]
pub struct ImportOutcome {
    /// Counts and reports for the run.
    pub summary: ImportSummary,
    /// Rejected rows awaiting manual correction.
    pub queue: CorrectionQueue,
}

/// Public entry point for importing registry files into the address store.
pub struct ImportService {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn AddressStore>,
    config: ImportConfig,
    delimiter: u8,
    fallback: &'static Encoding,
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ImportService {
    /// Create a service bound to the given reducers and store.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Encoding`] for an unknown fallback encoding, or
    /// [`ImportError::Config`] for a non-ASCII delimiter.
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<dyn AddressStore>,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        let fallback = encoding_for_label(&config.fallback_encoding).map_err(ImportError::Encoding)?;
        let delimiter = config
            .delimiter_byte()
            .map_err(|err| ImportError::Config(err.to_string()))?;
        Ok(Self {
            registry,
            store,
            config,
            delimiter,
            fallback,
            running: AtomicBool::new(false),
        })
    }

    /// The store imports are written to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn AddressStore> {
        Arc::clone(&self.store)
    }

    /// Decode, tokenize and reduce `files` without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Decode`] for an unreadable file or
    /// [`ImportError::MissingSource`] when no reducer handles a file.
    pub fn analyze(&self, files: &[RegistryFile<'_>]) -> Result<Analysis, ImportError> {
        let mut analysis = Analysis::default();

        for file in files {
            let plugin = self
                .registry
                .plugin(file.kind)
                .ok_or(ImportError::MissingSource(file.kind))?;
            let text = decode(file.bytes, self.fallback).map_err(|error| ImportError::Decode {
                kind: file.kind,
                error,
            })?;
            let rows = tokenize(&text, self.delimiter);
            let data_rows = rows
                .get(usize::from(self.config.skip_header)..)
                .unwrap_or_default();

            let reduction = plugin.reducer.reduce(data_rows);
            info!(
                source = %file.kind,
                rows = reduction.rows_seen,
                entries = reduction.entries.len(),
                invalid = reduction.invalid_rows.len(),
                "reduced {} registry",
                plugin.name
            );

            analysis.total_rows_seen += reduction.rows_seen;
            analysis.entries.extend(reduction.entries);
            analysis.invalid_rows.extend(reduction.invalid_rows);
        }

        analysis.duplicates = detect_duplicates(&analysis.entries);
        Ok(analysis)
    }

    /// Import `files`: reduce them, reconcile against the store and create
    /// every entry the store does not hold yet.
    ///
    /// Only one run may be active at a time. Row-level problems end up in the
    /// returned queue; store failures abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::AlreadyRunning`] while another run is active,
    /// any error from [`ImportService::analyze`], or
    /// [`ImportError::StoreUnavailable`] when listing or creating fails.
    pub async fn run_import(&self, files: &[RegistryFile<'_>]) -> Result<ImportOutcome, ImportError> {
        let _guard = self.acquire()?;

        let analysis = self.analyze(files)?;
        let unique_entries = analysis.entries.len();
        let duplicates_total = analysis.duplicates.len();
        let mut duplicates = analysis.duplicates;
        duplicates.truncate(self.config.duplicate_preview_limit);

        let existing = self.store.list().await?;
        let plan = reconcile(analysis.entries, &existing);

        let mut created = 0;
        for entry in &plan.to_create {
            if let Err(err) = self.store.create(entry.to_new_address()).await {
                warn!(created, pending = plan.to_create.len() - created, "store create failed");
                return Err(err.into());
            }
            created += 1;
        }

        let queue = CorrectionQueue::new(analysis.invalid_rows);
        let summary = ImportSummary {
            total_rows_seen: analysis.total_rows_seen,
            unique_entries,
            created,
            skipped_existing: plan.skipped_existing,
            duplicates,
            duplicates_total,
            invalid_rows: queue.snapshot(),
        };
        info!(
            rows = summary.total_rows_seen,
            unique = summary.unique_entries,
            created = summary.created,
            skipped = summary.skipped_existing,
            duplicates = summary.duplicates_total,
            invalid = summary.invalid_rows.len(),
            "import finished"
        );

        Ok(ImportOutcome { summary, queue })
    }

    fn acquire(&self) -> Result<RunGuard<'_>, ImportError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_running| ImportError::AlreadyRunning)?;
        Ok(RunGuard(&self.running))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::{ParsedAddressFields, RawRow, RejectionReason, WasteTag};
    use crate::plugin::SourcePlugin;
    use crate::ports::{Reduction, RegistryReducer};
    use crate::store::MemoryStore;

    /// Treats column 1 as the street and column 2 as the city.
    struct ColumnReducer;

    impl RegistryReducer for ColumnReducer {
        fn kind(&self) -> SourceKind {
            SourceKind::Residential
        }

        fn reduce(&self, rows: &[RawRow]) -> Reduction {
            let mut reduction = Reduction {
                rows_seen: rows.len(),
                ..Reduction::default()
            };
            for row in rows {
                let street = row.field(1).unwrap_or_default().to_owned();
                let city = row.field(2).unwrap_or_default().to_owned();
                if city.is_empty() {
                    reduction.invalid_rows.push(InvalidRow {
                        source_kind: SourceKind::Residential,
                        line: row.line,
                        raw_text: row.raw_text(),
                        reason: RejectionReason::MissingCity,
                        partial: ParsedAddressFields {
                            street,
                            ..ParsedAddressFields::default()
                        },
                        owner_label: None,
                        declared_containers: Vec::new(),
                        waste_types: BTreeSet::new(),
                        notes: String::new(),
                    });
                    continue;
                }
                reduction.entries.push(CanonicalEntry {
                    street,
                    number: String::new(),
                    city,
                    postal_code: None,
                    notes: "Residential".to_owned(),
                    waste_types: BTreeSet::from([WasteTag::Mixed]),
                    declared_containers: Vec::new(),
                    source_kind: SourceKind::Residential,
                    occurrence_count: 1,
                    owner_label: None,
                    owner_labels: Vec::new(),
                    declaration: None,
                });
            }
            reduction
        }
    }

    fn service(store: Arc<dyn AddressStore>, config: ImportConfig) -> ImportService {
        let registry = SourceRegistry::new(vec![SourcePlugin {
            name: "test".to_owned(),
            reducer: Arc::new(ColumnReducer),
        }]);
        ImportService::new(Arc::new(registry), store, config).unwrap()
    }

    const FILE: &[u8] = b"lp;street;city\n1;Polna;Pleszew\n2;Rynek;\n3;Zielona;Gizalki\n";

    #[tokio::test]
    async fn header_is_skipped_and_rows_are_counted() {
        let store = Arc::new(MemoryStore::default());
        let service = service(Arc::clone(&store) as Arc<dyn AddressStore>, ImportConfig::default());

        let outcome = service
            .run_import(&[RegistryFile::residential(FILE)])
            .await
            .unwrap();

        assert_eq!(outcome.summary.total_rows_seen, 3);
        assert_eq!(outcome.summary.unique_entries, 2);
        assert_eq!(outcome.summary.created, 2);
        assert_eq!(outcome.summary.invalid_rows.len(), 1);
        assert_eq!(outcome.queue.len(), 1);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let store = Arc::new(MemoryStore::default());
        let service = service(Arc::clone(&store) as Arc<dyn AddressStore>, ImportConfig::default());
        let files = [RegistryFile::residential(FILE)];

        let first = service.run_import(&files).await.unwrap();
        let second = service.run_import(&files).await.unwrap();

        assert_eq!(second.summary.created, 0);
        assert_eq!(
            second.summary.skipped_existing,
            first.summary.created + first.summary.skipped_existing
        );
    }

    #[tokio::test]
    async fn duplicate_preview_is_capped() {
        let rows: String = (0..5)
            .map(|street| format!("1;Ulica {street};Pleszew\n2;Ulica {street};Pleszew\n"))
            .collect();
        let file = format!("lp;street;city\n{rows}");
        let config = ImportConfig {
            duplicate_preview_limit: 3,
            ..ImportConfig::default()
        };
        let service = service(Arc::new(MemoryStore::default()), config);

        let outcome = service
            .run_import(&[RegistryFile::residential(file.as_bytes())])
            .await
            .unwrap();

        assert_eq!(outcome.summary.duplicates.len(), 3);
        assert_eq!(outcome.summary.duplicates_total, 5);
        assert_eq!(outcome.summary.duplicates[0].display_label, "Ulica 0, Pleszew");
    }

    #[tokio::test]
    async fn missing_reducer_is_reported() {
        let service = service(Arc::new(MemoryStore::default()), ImportConfig::default());
        let err = service
            .run_import(&[RegistryFile::commercial(FILE)])
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingSource(SourceKind::Commercial)));
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let service = service(Arc::new(MemoryStore::default()), ImportConfig::default());
        let guard = service.acquire().unwrap();
        let err = service
            .run_import(&[RegistryFile::residential(FILE)])
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::AlreadyRunning));

        drop(guard);
        assert!(service.run_import(&[RegistryFile::residential(FILE)]).await.is_ok());
    }

    #[test]
    fn unknown_fallback_encoding_fails_construction() {
        let config = ImportConfig {
            fallback_encoding: "nope".to_owned(),
            ..ImportConfig::default()
        };
        let registry = Arc::new(SourceRegistry::new(Vec::new()));
        assert!(matches!(
            ImportService::new(registry, Arc::new(MemoryStore::default()), config),
            Err(ImportError::Encoding(_))
        ));
    }
}
