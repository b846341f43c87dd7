//! Scorecard repository trait definition.

use creditflow_types::error::RepositoryError;
use creditflow_types::scorecard::{Attribute, Characteristic, Scorecard};
use uuid::Uuid;

/// Repository trait for scorecards, characteristics and attributes.
///
/// `get_scorecard` returns the full tree: characteristics ordered by
/// `order`, each with its attributes.
pub trait ScorecardRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Scorecards
    // -----------------------------------------------------------------------

    /// Upsert scorecard header fields. Characteristics are saved separately.
    fn save_scorecard(
        &self,
        scorecard: &Scorecard,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_scorecard(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Scorecard>, RepositoryError>> + Send;

    fn list_scorecards(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Scorecard>, RepositoryError>> + Send;

    /// Delete a scorecard with its characteristics and attributes.
    fn delete_scorecard(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Characteristics
    // -----------------------------------------------------------------------

    /// Upsert characteristic fields. Attributes are saved separately.
    fn save_characteristic(
        &self,
        characteristic: &Characteristic,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_characteristic(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Characteristic>, RepositoryError>> + Send;

    fn delete_characteristic(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    fn save_attribute(
        &self,
        attribute: &Attribute,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_attribute(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
