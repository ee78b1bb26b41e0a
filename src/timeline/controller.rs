//! Runs one participant session end to end

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::context::SessionContext;
use super::rendezvous::Rendezvous;
use super::screen::{Input, Screen};
use super::sequence::Timeline;
use super::trial::{Outcome, TrialEnv, TrialHandler};
use super::{SessionOutcome, TimelineError};
use crate::client::{ClientError, ContentSource, LeaseService};
use crate::config::ExperimentConfig;
use crate::content::{ContentError, StudyContent, TrialOrder};
use crate::session::{SessionPayload, SessionSink, TrialEntry};

/// How the trial loop stopped
enum Drive {
    Finished(SessionContext),
    Disconnected(SessionContext),
}

/// Drives sessions against a lease service, a content source and a sink.
#[derive(Clone)]
pub struct TimelineController {
    leases: Arc<dyn LeaseService>,
    content: Arc<dyn ContentSource>,
    sink: Arc<dyn SessionSink>,
    experiment: ExperimentConfig,
}

impl TimelineController {
    pub fn new(
        leases: Arc<dyn LeaseService>,
        content: Arc<dyn ContentSource>,
        sink: Arc<dyn SessionSink>,
        experiment: ExperimentConfig,
    ) -> Self {
        Self {
            leases,
            content,
            sink,
            experiment,
        }
    }

    /// Run a full session for `requester` over `port`.
    ///
    /// Returns once the session reaches a terminal state. Errors are only
    /// returned for inconsistencies inside the timeline itself; the lease
    /// is released as abandoned before they propagate.
    pub async fn run(
        &self,
        requester: &str,
        mut port: Rendezvous,
    ) -> Result<SessionOutcome, TimelineError> {
        let started_at = Utc::now();

        if port.present(Screen::Loading).await.is_err() {
            return Ok(SessionOutcome::Abandoned {
                condition_id: None,
                trials_completed: 0,
            });
        }

        let (lease, bank) = tokio::join!(
            self.leases.allocate(requester),
            self.content.problem_bank()
        );

        let assignment = match lease {
            Ok(assignment) => assignment,
            Err(ClientError::PoolExhausted) => {
                info!(requester, "No condition available");
                let _ = port.present(Screen::Unavailable).await;
                return Ok(SessionOutcome::Unavailable);
            }
            Err(e) => {
                warn!(requester, error = %e, "Allocation failed");
                let reason = e.to_string();
                let _ = port
                    .present(Screen::LoadFailed {
                        reason: reason.clone(),
                    })
                    .await;
                return Ok(SessionOutcome::LoadFailed { reason });
            }
        };
        let condition_id = assignment.condition_id;

        let content = bank.and_then(|bank| {
            let order = TrialOrder::parse(&assignment.trial_order)?;
            StudyContent::new(order, bank)
        });
        let content = match content {
            Ok(content) => content,
            Err(e) => return Ok(self.load_failed(condition_id, e, &mut port).await),
        };

        info!(
            condition_id,
            requester,
            blocks = content.block_count(),
            "Session started"
        );

        let drive = match self.drive(&content, &mut port).await {
            Ok(drive) => drive,
            Err(e) => {
                error!(condition_id, error = %e, "Timeline failed");
                self.leases.release(condition_id, false).await;
                return Err(e);
            }
        };

        let ctx = match drive {
            Drive::Finished(ctx) => ctx,
            Drive::Disconnected(ctx) => {
                let trials_completed = ctx.history.len();
                info!(condition_id, trials_completed, "Participant left");
                self.leases.release(condition_id, false).await;
                return Ok(SessionOutcome::Abandoned {
                    condition_id: Some(condition_id),
                    trials_completed,
                });
            }
        };

        let payload = SessionPayload {
            session_id: Uuid::new_v4(),
            requester: requester.to_string(),
            condition_id,
            version: self.experiment.version.clone(),
            started_at,
            finished_at: Utc::now(),
            instruction_loops: ctx.instruction_loops,
            quiz_loops: ctx.quiz_loops,
            quiz_correct: ctx.quiz_correct,
            running_total: ctx.ledger.running,
            free_text: ctx.free_text,
            survey: ctx.survey,
            trials: ctx.history,
        };

        let delivered = match self.sink.submit(&payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(condition_id, session_id = %payload.session_id, error = %e, "Session payload not delivered");
                false
            }
        };
        self.leases.release(condition_id, true).await;

        info!(
            condition_id,
            running_total = payload.running_total,
            delivered,
            "Session completed"
        );
        Ok(SessionOutcome::Completed {
            payload: Box::new(payload),
            delivered,
        })
    }

    async fn load_failed(
        &self,
        condition_id: i64,
        err: ContentError,
        port: &mut Rendezvous,
    ) -> SessionOutcome {
        warn!(condition_id, error = %err, "Study content unusable");
        self.leases.release(condition_id, false).await;
        let reason = err.to_string();
        let _ = port
            .present(Screen::LoadFailed {
                reason: reason.clone(),
            })
            .await;
        SessionOutcome::LoadFailed { reason }
    }

    async fn drive(
        &self,
        content: &StudyContent,
        port: &mut Rendezvous,
    ) -> Result<Drive, TimelineError> {
        let env = TrialEnv::new(content, &self.experiment);
        let timeline = Timeline::build(content);
        let mut ctx = SessionContext::new();
        let mut cursor = 0;

        while let Some(trial) = timeline.get(cursor) {
            let started_at = Utc::now();
            port.begin_trial();
            ctx = trial.enter(&env, ctx);

            let record = loop {
                let screen = trial.render(&env, &ctx)?;
                if port.present(screen).await.is_err() {
                    return Ok(Drive::Disconnected(ctx));
                }

                let input = match trial.dwell(&env) {
                    Some(dwell) => {
                        if !dwell.is_zero() {
                            tokio::time::sleep(dwell).await;
                        }
                        Input::DwellElapsed
                    }
                    None => match port.next_input().await {
                        Ok(input) => input,
                        Err(_) => return Ok(Drive::Disconnected(ctx)),
                    },
                };

                let transition = trial.compute_result(&env, ctx, input)?;
                ctx = transition.ctx;
                if let Outcome::Complete(record) = transition.outcome {
                    break record;
                }
            };

            debug!(cursor, ?trial, "Trial completed");
            let next = timeline.next_index(cursor, trial, &record, &ctx, &env);
            if next < cursor {
                debug!(
                    instruction_loops = ctx.instruction_loops,
                    quiz_loops = ctx.quiz_loops,
                    "Back to instructions"
                );
            }
            ctx.history.push(TrialEntry {
                trial_index: ctx.history.len(),
                started_at,
                finished_at: Utc::now(),
                record,
            });
            cursor = next;
        }

        Ok(Drive::Finished(ctx))
    }
}
