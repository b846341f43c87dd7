//! Scorecard management and scoring service.

use std::collections::HashMap;

use chrono::Utc;
use creditflow_types::error::ScorecardError;
use creditflow_types::scorecard::{
    Attribute, Characteristic, CharacteristicMetrics, CreateAttributeRequest,
    CreateCharacteristicRequest, CreateScorecardRequest, DEFAULT_BASE_ODDS, DEFAULT_BASE_SCORE,
    DEFAULT_PDO, Scorecard, ScorecardStatus, ScoreResult, UpdateScorecardRequest,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::repository::scorecard::ScorecardRepository;
use crate::scorecard::{Scaling, describe, score};
use crate::scorecard::calculator::score_with_mapping;

/// Service for scorecard CRUD and score calculation.
pub struct ScorecardService<S: ScorecardRepository> {
    repo: S,
}

impl<S: ScorecardRepository> ScorecardService<S> {
    pub fn new(repo: S) -> Self {
        Self { repo }
    }

    // -----------------------------------------------------------------------
    // Scorecards
    // -----------------------------------------------------------------------

    pub async fn create_scorecard(
        &self,
        request: CreateScorecardRequest,
    ) -> Result<Scorecard, ScorecardError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ScorecardError::InvalidName(
                "name cannot be empty".to_string(),
            ));
        }
        let base_score = request.base_score.unwrap_or(DEFAULT_BASE_SCORE);
        let pdo = request.pdo.unwrap_or(DEFAULT_PDO);
        let base_odds = request.base_odds.unwrap_or(DEFAULT_BASE_ODDS);
        Scaling::new(base_score, pdo, base_odds)?;

        let now = Utc::now();
        let scorecard = Scorecard {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: request.description,
            base_score,
            pdo,
            base_odds,
            status: ScorecardStatus::Active,
            characteristics: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.repo.save_scorecard(&scorecard).await?;

        tracing::info!(scorecard_id = %scorecard.id, name = scorecard.name.as_str(), "scorecard created");
        Ok(scorecard)
    }

    /// The full scorecard tree.
    pub async fn get_scorecard(&self, id: &Uuid) -> Result<Scorecard, ScorecardError> {
        self.repo
            .get_scorecard(id)
            .await?
            .ok_or(ScorecardError::NotFound(*id))
    }

    pub async fn list_scorecards(&self) -> Result<Vec<Scorecard>, ScorecardError> {
        Ok(self.repo.list_scorecards().await?)
    }

    pub async fn update_scorecard(
        &self,
        id: &Uuid,
        request: UpdateScorecardRequest,
    ) -> Result<Scorecard, ScorecardError> {
        let mut scorecard = self.get_scorecard(id).await?;
        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ScorecardError::InvalidName(
                    "name cannot be empty".to_string(),
                ));
            }
            scorecard.name = name.to_string();
        }
        if let Some(description) = request.description {
            scorecard.description = description;
        }
        if let Some(status) = request.status {
            scorecard.status = status;
        }
        let base_score = request.base_score.unwrap_or(scorecard.base_score);
        let pdo = request.pdo.unwrap_or(scorecard.pdo);
        let base_odds = request.base_odds.unwrap_or(scorecard.base_odds);
        Scaling::new(base_score, pdo, base_odds)?;
        scorecard.base_score = base_score;
        scorecard.pdo = pdo;
        scorecard.base_odds = base_odds;
        scorecard.updated_at = Utc::now();

        self.repo.save_scorecard(&scorecard).await?;
        Ok(scorecard)
    }

    /// Delete a scorecard with its characteristics and attributes.
    pub async fn delete_scorecard(&self, id: &Uuid) -> Result<(), ScorecardError> {
        if !self.repo.delete_scorecard(id).await? {
            return Err(ScorecardError::NotFound(*id));
        }
        tracing::info!(scorecard_id = %id, "scorecard deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Characteristics
    // -----------------------------------------------------------------------

    /// Add a characteristic. Without an explicit order it goes last.
    pub async fn add_characteristic(
        &self,
        scorecard_id: &Uuid,
        request: CreateCharacteristicRequest,
    ) -> Result<Characteristic, ScorecardError> {
        let scorecard = self.get_scorecard(scorecard_id).await?;
        let name = validate_characteristic(&request)?;
        if scorecard.characteristics.iter().any(|c| c.name == name) {
            return Err(ScorecardError::InvalidCharacteristic(format!(
                "characteristic '{name}' already exists"
            )));
        }
        let order = request.order.unwrap_or_else(|| {
            scorecard
                .characteristics
                .iter()
                .map(|c| c.order + 1)
                .max()
                .unwrap_or(0)
        });

        let characteristic = Characteristic {
            id: Uuid::now_v7(),
            scorecard_id: *scorecard_id,
            name,
            description: request.description,
            weight: request.weight,
            order,
            attributes: Vec::new(),
        };
        self.repo.save_characteristic(&characteristic).await?;
        self.touch(scorecard).await?;
        Ok(characteristic)
    }

    /// Replace a characteristic's name, description, weight and (if given)
    /// order. Attributes are untouched.
    pub async fn update_characteristic(
        &self,
        id: &Uuid,
        request: CreateCharacteristicRequest,
    ) -> Result<Characteristic, ScorecardError> {
        let mut characteristic = self
            .repo
            .get_characteristic(id)
            .await?
            .ok_or(ScorecardError::CharacteristicNotFound(*id))?;
        characteristic.name = validate_characteristic(&request)?;
        characteristic.description = request.description;
        characteristic.weight = request.weight;
        if let Some(order) = request.order {
            characteristic.order = order;
        }
        self.repo.save_characteristic(&characteristic).await?;
        Ok(characteristic)
    }

    pub async fn delete_characteristic(&self, id: &Uuid) -> Result<(), ScorecardError> {
        if !self.repo.delete_characteristic(id).await? {
            return Err(ScorecardError::CharacteristicNotFound(*id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    pub async fn add_attribute(
        &self,
        characteristic_id: &Uuid,
        request: CreateAttributeRequest,
    ) -> Result<Attribute, ScorecardError> {
        let characteristic = self
            .repo
            .get_characteristic(characteristic_id)
            .await?
            .ok_or(ScorecardError::CharacteristicNotFound(*characteristic_id))?;

        let bin = request
            .bin
            .into_bin()
            .map_err(ScorecardError::InvalidAttribute)?;
        let label = match request.label.trim() {
            "" => format!("{} #{}", characteristic.name, characteristic.attributes.len() + 1),
            label => label.to_string(),
        };

        let attribute = Attribute {
            id: Uuid::now_v7(),
            characteristic_id: *characteristic_id,
            label,
            bin,
            counts: request.counts,
        };
        self.repo.save_attribute(&attribute).await?;
        Ok(attribute)
    }

    pub async fn delete_attribute(&self, id: &Uuid) -> Result<(), ScorecardError> {
        if !self.repo.delete_attribute(id).await? {
            return Err(ScorecardError::AttributeNotFound(*id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scoring
    // -----------------------------------------------------------------------

    /// Score `input` against the scorecard. Missing and unmatched fields
    /// contribute zero points and are reported as warnings.
    pub async fn calculate(
        &self,
        id: &Uuid,
        input: &Map<String, Value>,
    ) -> Result<ScoreResult, ScorecardError> {
        let scorecard = self.get_scorecard(id).await?;
        score(&scorecard, input)
    }

    /// Like [`calculate`](Self::calculate) with characteristic -> field
    /// overrides.
    pub async fn calculate_mapped(
        &self,
        id: &Uuid,
        input: &Map<String, Value>,
        mapping: &HashMap<String, String>,
    ) -> Result<ScoreResult, ScorecardError> {
        let scorecard = self.get_scorecard(id).await?;
        score_with_mapping(&scorecard, input, mapping)
    }

    /// WOE, IV and points of every attribute.
    pub async fn metrics(&self, id: &Uuid) -> Result<Vec<CharacteristicMetrics>, ScorecardError> {
        let scorecard = self.get_scorecard(id).await?;
        describe(&scorecard)
    }

    async fn touch(&self, mut scorecard: Scorecard) -> Result<(), ScorecardError> {
        scorecard.updated_at = Utc::now();
        self.repo.save_scorecard(&scorecard).await?;
        Ok(())
    }
}

fn validate_characteristic(request: &CreateCharacteristicRequest) -> Result<String, ScorecardError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ScorecardError::InvalidCharacteristic(
            "name cannot be empty".to_string(),
        ));
    }
    if !(request.weight.is_finite() && request.weight >= 0.0) {
        return Err(ScorecardError::InvalidCharacteristic(format!(
            "weight must be a non-negative number, got {}",
            request.weight
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use creditflow_types::scorecard::{AttributeBin, BinCounts, BinSpec};
    use serde_json::json;

    fn service() -> ScorecardService<MemoryStore> {
        ScorecardService::new(MemoryStore::new())
    }

    fn create(name: &str) -> CreateScorecardRequest {
        CreateScorecardRequest {
            name: name.to_string(),
            description: String::new(),
            base_score: None,
            pdo: None,
            base_odds: None,
        }
    }

    fn characteristic(name: &str) -> CreateCharacteristicRequest {
        CreateCharacteristicRequest {
            name: name.to_string(),
            description: String::new(),
            weight: 100.0,
            order: None,
        }
    }

    fn range(label: &str, min: f64, max: f64, good: u64, bad: u64) -> CreateAttributeRequest {
        CreateAttributeRequest {
            label: label.to_string(),
            bin: BinSpec {
                min_value: Some(min),
                max_value: Some(max),
                category: None,
            },
            counts: BinCounts {
                good_count: good,
                bad_count: bad,
                total_good: 100,
                total_bad: 100,
            },
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        assert_eq!(card.base_score, 600.0);
        assert_eq!(card.pdo, 20.0);
        assert_eq!(card.base_odds, 50.0);
        assert_eq!(card.status, ScorecardStatus::Active);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_scaling() {
        let svc = service();
        let mut req = create("Bad");
        req.pdo = Some(0.0);
        assert!(matches!(
            svc.create_scorecard(req).await.unwrap_err(),
            ScorecardError::InvalidScaling(_)
        ));
    }

    #[tokio::test]
    async fn test_build_tree_and_calculate() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let income = svc
            .add_characteristic(&card.id, characteristic("income"))
            .await
            .unwrap();
        svc.add_attribute(&income.id, range("low", 0.0, 30_000.0, 20, 60))
            .await
            .unwrap();
        svc.add_attribute(&income.id, range("high", 30_000.0, 1e9, 80, 40))
            .await
            .unwrap();

        let tree = svc.get_scorecard(&card.id).await.unwrap();
        assert_eq!(tree.characteristics.len(), 1);
        assert_eq!(tree.characteristics[0].attributes.len(), 2);

        let mut input = Map::new();
        input.insert("income".to_string(), json!(45000));
        let result = svc.calculate(&card.id, &input).await.unwrap();
        assert_eq!(result.breakdown[0].matched_attribute.as_deref(), Some("high"));
        assert!(result.total_score > result.offset);

        let metrics = svc.metrics(&card.id).await.unwrap();
        assert!(metrics[0].information_value > 0.0);
    }

    #[tokio::test]
    async fn test_calculate_unknown_scorecard() {
        let svc = service();
        let err = svc.calculate(&Uuid::now_v7(), &Map::new()).await.unwrap_err();
        assert!(matches!(err, ScorecardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_characteristic_validation() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let mut req = characteristic("age");
        req.weight = -1.0;
        assert!(matches!(
            svc.add_characteristic(&card.id, req).await.unwrap_err(),
            ScorecardError::InvalidCharacteristic(_)
        ));

        svc.add_characteristic(&card.id, characteristic("age"))
            .await
            .unwrap();
        assert!(matches!(
            svc.add_characteristic(&card.id, characteristic("age"))
                .await
                .unwrap_err(),
            ScorecardError::InvalidCharacteristic(_)
        ));
    }

    #[tokio::test]
    async fn test_characteristics_append_in_order() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let a = svc.add_characteristic(&card.id, characteristic("a")).await.unwrap();
        let b = svc.add_characteristic(&card.id, characteristic("b")).await.unwrap();
        assert_eq!(a.order, 0);
        assert_eq!(b.order, 1);
    }

    #[tokio::test]
    async fn test_attribute_bin_rules() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let c = svc
            .add_characteristic(&card.id, characteristic("housing"))
            .await
            .unwrap();

        let mut both = range("bad", 0.0, 1.0, 1, 1);
        both.bin.category = Some("own".to_string());
        assert!(matches!(
            svc.add_attribute(&c.id, both).await.unwrap_err(),
            ScorecardError::InvalidAttribute(_)
        ));

        let inverted = range("inv", 5.0, 1.0, 1, 1);
        assert!(svc.add_attribute(&c.id, inverted).await.is_err());

        let own = CreateAttributeRequest {
            label: String::new(),
            bin: BinSpec {
                min_value: None,
                max_value: None,
                category: Some("own".to_string()),
            },
            counts: BinCounts::default(),
        };
        let attr = svc.add_attribute(&c.id, own).await.unwrap();
        assert_eq!(attr.bin, AttributeBin::Category("own".to_string()));
        assert_eq!(attr.label, "housing #1");
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let c = svc
            .add_characteristic(&card.id, characteristic("income"))
            .await
            .unwrap();
        svc.delete_scorecard(&card.id).await.unwrap();
        assert!(svc.get_scorecard(&card.id).await.is_err());
        assert!(matches!(
            svc.delete_characteristic(&c.id).await.unwrap_err(),
            ScorecardError::CharacteristicNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_scaling_validated() {
        let svc = service();
        let card = svc.create_scorecard(create("Retail")).await.unwrap();
        let updated = svc
            .update_scorecard(
                &card.id,
                UpdateScorecardRequest {
                    base_score: Some(700.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.base_score, 700.0);

        let err = svc
            .update_scorecard(
                &card.id,
                UpdateScorecardRequest {
                    base_odds: Some(-2.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScorecardError::InvalidScaling(_)));
    }
}
