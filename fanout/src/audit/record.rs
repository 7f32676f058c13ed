use fanout_config::shared::AuditConfig;
use metrics::gauge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::audit::base::{AuditReader, AuditSource, Auditable};
use crate::audit::report::{AuditReport, Mismatch};
use crate::audit::sample::{sample_keys, sample_size};
use crate::error::FanoutResult;
use crate::metrics::{AUDIT_LABEL, FANOUT_AUDIT_MISMATCHES};

/// Compares a random sample of source records against every target.
pub struct RecordAuditor<R: Auditable> {
    source: Arc<dyn AuditSource<R>>,
    targets: Vec<Arc<dyn AuditReader<R>>>,
    config: AuditConfig,
}

impl<R: Auditable> RecordAuditor<R> {
    pub fn new(
        source: Arc<dyn AuditSource<R>>,
        targets: Vec<Arc<dyn AuditReader<R>>>,
        config: AuditConfig,
    ) -> Self {
        Self {
            source,
            targets,
            config,
        }
    }

    /// Audits a sample drawn with an entropy seeded generator.
    pub async fn run(&self) -> FanoutResult<AuditReport<R::Position>> {
        self.run_with_rng(&mut StdRng::from_entropy()).await
    }

    /// Audits a sample drawn with `rng`.
    pub async fn run_with_rng<G>(&self, rng: &mut G) -> FanoutResult<AuditReport<R::Position>>
    where
        G: Rng + Send,
    {
        let keys = self.source.all_keys().await?;
        if keys.is_empty() {
            warn!(source = self.source.name(), "source is empty, nothing to audit");
            return Ok(AuditReport {
                sampled: 0,
                mismatches: Vec::new(),
            });
        }

        let size = sample_size(
            keys.len(),
            self.config.sample_fraction,
            self.config.min_sample_size,
        );
        let mut sample = sample_keys(&keys, size, rng);
        sample.sort_unstable();

        info!(
            source = self.source.name(),
            total = keys.len(),
            sampled = sample.len(),
            targets = self.targets.len(),
            "auditing sampled records"
        );

        let expected = self.source.read_records(&sample).await?;

        let mut mismatches = Vec::new();
        for target in &self.targets {
            let actual = target.read_records(&sample).await?;

            for key in &sample {
                let Some(expected) = expected.get(key) else {
                    debug!(key = ?key, "sampled key vanished from source, skipping");
                    continue;
                };

                let mismatch = match actual.get(key) {
                    None => Mismatch::Missing {
                        target: target.name().to_string(),
                        key: key.clone(),
                    },
                    Some(actual) if actual.normalized() != expected.normalized() => {
                        Mismatch::Differs {
                            target: target.name().to_string(),
                            key: key.clone(),
                            expected: format!("{:?}", expected.normalized()),
                            actual: format!("{:?}", actual.normalized()),
                        }
                    }
                    Some(_) => continue,
                };

                error!(target = target.name(), mismatch = ?mismatch, "record mismatch found");
                mismatches.push(mismatch);
            }
        }

        gauge!(FANOUT_AUDIT_MISMATCHES, AUDIT_LABEL => "records").set(mismatches.len() as f64);

        Ok(AuditReport {
            sampled: sample.len(),
            mismatches,
        })
    }
}
