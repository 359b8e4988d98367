//! Multi-step tournament registration: details → team → payment →
//! confirmation.
//!
//! Payment itself happens elsewhere; completing the payment step only records
//! a paid registration and reveals the room credentials.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Registration, RoomCredentials, Tournament, TournamentStatus, REGISTRATIONS};
use crate::query::{to_row, FetchAll, QueryError, QueryLayer};
use crate::remote::TableClient;
use crate::session::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Details,
    Team,
    Payment,
    Confirmation,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("tournament is not accepting registrations ({0:?})")]
    NotAccepting(TournamentStatus),

    #[error("cannot {action} during the {from:?} step")]
    OutOfOrder {
        action: &'static str,
        from: CheckoutStep,
    },

    #[error("team is full: at most {max} teammates")]
    TeamFull { max: usize },

    #[error("already registered for this tournament")]
    AlreadyRegistered,

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone)]
pub struct Checkout {
    tournament: Tournament,
    step: CheckoutStep,
    teammates: Vec<Uuid>,
}

impl Checkout {
    pub fn start(tournament: Tournament) -> Result<Self, CheckoutError> {
        if !tournament.status.accepts_registrations() {
            return Err(CheckoutError::NotAccepting(tournament.status));
        }
        Ok(Self {
            tournament,
            step: CheckoutStep::Details,
            teammates: Vec::new(),
        })
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn tournament(&self) -> &Tournament {
        &self.tournament
    }

    pub fn teammates(&self) -> &[Uuid] {
        &self.teammates
    }

    /// The registering player fills one seat.
    pub fn max_teammates(&self) -> usize {
        (self.tournament.team_size as usize).saturating_sub(1)
    }

    fn require_step(
        &self,
        action: &'static str,
        allowed: &[CheckoutStep],
    ) -> Result<(), CheckoutError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(CheckoutError::OutOfOrder {
                action,
                from: self.step,
            })
        }
    }

    pub fn choose_team(&mut self) -> Result<(), CheckoutError> {
        self.require_step("choose a team", &[CheckoutStep::Details])?;
        self.step = CheckoutStep::Team;
        Ok(())
    }

    /// Selects `friend` or, if already selected, deselects it. Returns
    /// whether the friend is selected afterwards.
    pub fn toggle_teammate(&mut self, friend: Uuid) -> Result<bool, CheckoutError> {
        self.require_step("pick teammates", &[CheckoutStep::Team])?;
        if let Some(pos) = self.teammates.iter().position(|id| *id == friend) {
            self.teammates.remove(pos);
            return Ok(false);
        }
        if self.teammates.len() >= self.max_teammates() {
            return Err(CheckoutError::TeamFull {
                max: self.max_teammates(),
            });
        }
        self.teammates.push(friend);
        Ok(true)
    }

    pub fn proceed_to_payment(&mut self) -> Result<(), CheckoutError> {
        self.require_step(
            "proceed to payment",
            &[CheckoutStep::Details, CheckoutStep::Team],
        )?;
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Records the paid registration, notifies, and reveals the room.
    pub async fn complete<C: TableClient>(
        &mut self,
        query: &QueryLayer<C>,
        notifications: &NotificationStore<C>,
        user_id: Uuid,
    ) -> Result<RoomCredentials, CheckoutError> {
        self.require_step("complete payment", &[CheckoutStep::Payment])?;

        let existing = query
            .fetch_all(
                &FetchAll::new(REGISTRATIONS)
                    .eq("tournament_id", &self.tournament.id)
                    .eq("user_id", user_id.to_string())
                    .limit(1),
            )
            .await?;
        if !existing.is_empty() {
            return Err(CheckoutError::AlreadyRegistered);
        }

        let registration = Registration {
            id: None,
            tournament_id: self.tournament.id.clone(),
            user_id,
            team: std::iter::once(user_id)
                .chain(self.teammates.iter().copied())
                .collect(),
            paid: true,
        };
        query
            .insert_record(REGISTRATIONS, &to_row(&registration)?)
            .await?;
        self.step = CheckoutStep::Confirmation;
        log::info!(
            "user {user_id} registered for tournament {} with {} teammates",
            self.tournament.id,
            self.teammates.len()
        );

        // The registration stands even if the notice cannot be written.
        if let Err(e) = notifications
            .add_notification(
                "Tournament Registration Complete",
                &format!("You have successfully registered for {}.", self.tournament.name),
            )
            .await
        {
            log::warn!("registration notice not stored: {e}");
        }

        Ok(self.tournament.credentials())
    }
}

/// Response body of a finished checkout.
#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub step: CheckoutStep,
    pub tournament: Tournament,
    pub team: Vec<Uuid>,
    pub room: RoomCredentials,
}

impl Confirmation {
    pub fn new(checkout: &Checkout, room: RoomCredentials) -> Self {
        Self {
            step: checkout.step(),
            tournament: checkout.tournament().clone().redacted(),
            team: checkout.teammates().to_vec(),
            room,
        }
    }
}

/// `json!` view used by the details page before any step is taken.
pub fn summary(tournament: &Tournament) -> serde_json::Value {
    json!({
        "step": CheckoutStep::Details,
        "tournament": tournament.clone().redacted(),
        "max_teammates": (tournament.team_size as usize).saturating_sub(1),
    })
}
