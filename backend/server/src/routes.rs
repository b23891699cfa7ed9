use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{self, Path},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use scoring::{
    DuplicateCheck, DuplicateWarning, FeatureContext, FeatureVector, FeatureWeights, Interaction,
    InteractionType, RankedRecipe, Recipe, SimilarityWeights, TrainingMetrics,
    ranker::{rank_fallback, rank_personalized},
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::{
    config::WeightsUnavailableMode,
    error::AppError,
    state::State,
    utils::{bounded, parse_json},
};

type AppState = extract::State<Arc<State>>;

#[derive(Deserialize)]
pub struct SimilarityRequest {
    pub recipe: Recipe,

    /// Pool to check against. Read from the store when absent.
    #[serde(default)]
    pub candidates: Option<Vec<Recipe>>,

    #[serde(default)]
    pub weights: Option<SimilarityWeights>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SimilarityResponse {
    pub has_similar_recipes: bool,
    pub warning: Option<DuplicateWarning>,
    /// True when the pool couldn't be read and the check was skipped.
    pub degraded: bool,
}

#[derive(Deserialize)]
pub struct InteractionRequest {
    pub user_id: String,
    pub recipe_id: String,
    pub interaction_type: InteractionType,
    pub value: f64,

    #[serde(default)]
    pub features: FeatureVector,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_personalization() -> bool {
    true
}

#[derive(Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub candidates: Vec<Recipe>,

    #[serde(default = "default_personalization")]
    pub use_personalization: bool,

    #[serde(default)]
    pub preferred_cuisines: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Disabled,
    StorageUnavailable,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RecommendationResponse {
    pub personalized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,

    pub recipes: Vec<RankedRecipe>,
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn similarity_handler(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<Json<SimilarityResponse>, AppError> {
    let request: SimilarityRequest = parse_json(&body)?;

    let check = DuplicateCheck {
        weights: request
            .weights
            .unwrap_or(state.config.duplicate_check.weights),
        ..state.config.duplicate_check
    };
    check.validate()?;
    request.recipe.validate()?;

    let candidates = match request.candidates {
        Some(candidates) => candidates,
        None => match bounded(state.config.store_timeout, state.store.recipes()).await {
            Ok(recipes) => recipes,
            Err(e) if state.config.duplicate_check_fail_open => {
                warn!("Skipping duplicate check, candidate pool unavailable: {e}");

                return Ok(Json(SimilarityResponse {
                    has_similar_recipes: false,
                    warning: None,
                    degraded: true,
                }));
            }
            Err(e) => return Err(e),
        },
    };

    let warning = check.check(&request.recipe, &candidates)?;

    Ok(Json(SimilarityResponse {
        has_similar_recipes: warning.is_some(),
        warning,
        degraded: false,
    }))
}

pub async fn interactions_handler(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: InteractionRequest = parse_json(&body)?;

    if request.user_id.trim().is_empty() || request.recipe_id.trim().is_empty() {
        return Err(AppError::MalformedPayload(
            "user_id and recipe_id are required".to_string(),
        ));
    }

    if !request.value.is_finite() {
        return Err(AppError::MalformedPayload("value must be finite".to_string()));
    }

    let interaction = Interaction {
        user_id: request.user_id,
        recipe_id: request.recipe_id,
        interaction_type: request.interaction_type,
        value: request.value,
        features: request.features,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };

    match state.training_queue.try_send(interaction) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(TrySendError::Full(_)) => Err(AppError::QueueFull),
        Err(TrySendError::Closed(_)) => Err(AppError::InternalError(
            "Training worker is not running".into(),
        )),
    }
}

pub async fn recommendations_handler(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<Json<RecommendationResponse>, AppError> {
    let request: RecommendationRequest = parse_json(&body)?;
    let now = Utc::now();

    if !request.use_personalization {
        return Ok(Json(fallback(&request.candidates, now, FallbackReason::Disabled)));
    }

    let stored = match bounded(state.config.store_timeout, state.store.weights(&request.user_id)).await
    {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Weights unavailable for {}: {e}", request.user_id);

            if state.config.weights_unavailable == WeightsUnavailableMode::Fallback {
                return Ok(Json(fallback(
                    &request.candidates,
                    now,
                    FallbackReason::StorageUnavailable,
                )));
            }

            BTreeMap::new()
        }
    };

    let like = user_weights(&state, &stored, &request.user_id, InteractionType::Like);
    let save = user_weights(&state, &stored, &request.user_id, InteractionType::Save);
    let context = FeatureContext::new(now).with_cuisines(request.preferred_cuisines);

    let recipes = rank_personalized(
        &request.candidates,
        &like,
        &save,
        &state.config.blend,
        &context,
    );

    Ok(Json(RecommendationResponse {
        personalized: true,
        fallback_reason: None,
        recipes,
    }))
}

pub async fn weights_handler(
    extract::State(state): AppState,
    Path(user_id): Path<String>,
) -> Result<Json<BTreeMap<InteractionType, FeatureWeights>>, AppError> {
    let stored = bounded(state.config.store_timeout, state.store.weights(&user_id)).await?;

    let weights = InteractionType::ALL
        .into_iter()
        .map(|kind| (kind, user_weights(&state, &stored, &user_id, kind)))
        .collect();

    Ok(Json(weights))
}

pub async fn metrics_handler(
    extract::State(state): AppState,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TrainingMetrics>>, AppError> {
    let metrics = bounded(state.config.store_timeout, state.store.metrics(&user_id)).await?;

    Ok(Json(metrics))
}

pub async fn recipes_handler(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let recipes: Vec<Recipe> = parse_json(&body)?;

    if recipes.iter().any(|recipe| recipe.id.trim().is_empty()) {
        return Err(AppError::MalformedPayload("every recipe needs an id".to_string()));
    }

    for recipe in &recipes {
        recipe.validate()?;
    }

    bounded(state.config.store_timeout, state.store.upsert_recipes(&recipes)).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn fallback(candidates: &[Recipe], now: DateTime<Utc>, reason: FallbackReason) -> RecommendationResponse {
    RecommendationResponse {
        personalized: false,
        fallback_reason: Some(reason),
        recipes: rank_fallback(candidates, now),
    }
}

fn user_weights(
    state: &State,
    stored: &BTreeMap<InteractionType, FeatureWeights>,
    user_id: &str,
    interaction_type: InteractionType,
) -> FeatureWeights {
    stored
        .get(&interaction_type)
        .cloned()
        .unwrap_or_else(|| state.defaults.seed(user_id, interaction_type))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header::CONTENT_TYPE},
    };
    use scoring::{
        DefaultWeights, Feature, FeatureVector, InteractionType, Recipe,
        similarity::SimilarityFeature,
    };
    use serde_json::{Value, json};
    use tokio::sync::mpsc::Receiver;
    use tower::ServiceExt;

    use super::{RecommendationResponse, SimilarityResponse};
    use crate::{
        app,
        config::{Config, WeightsUnavailableMode},
        database::{MemoryStore, Store},
        state::State,
    };

    struct Harness {
        app: Router,
        state: Arc<State>,
        memory: Arc<MemoryStore>,
        receiver: Receiver<scoring::Interaction>,
    }

    fn harness(config: Config) -> Harness {
        let memory = Arc::new(MemoryStore::default());
        let (state, receiver) = State::with_store(
            config,
            Store::Memory(memory.clone()),
            DefaultWeights::builtin().unwrap(),
        );

        Harness {
            app: app(state.clone()),
            state,
            memory,
            receiver,
        }
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, bytes.to_vec())
    }

    fn carbonara(id: &str) -> Value {
        json!({
            "id": id,
            "title": "Chicken Pasta Carbonara",
            "ingredients": ["chicken", "pasta", "eggs", "cheese", "bacon"]
        })
    }

    fn candidates() -> Value {
        json!([
            { "id": "a", "title": "Plain Rice", "ingredients": ["rice"], "likes": 3, "relevance": 0.1 },
            { "id": "b", "title": "Green Curry", "ingredients": ["curry"], "likes": 300, "relevance": 0.9, "cuisine": "Thai" },
            { "id": "c", "title": "Bolognese", "ingredients": ["beef"], "likes": 40, "relevance": 0.6 }
        ])
    }

    #[tokio::test]
    async fn test_health() {
        let harness = harness(Config::default());

        let (status, body) = call(&harness.app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_similarity_with_supplied_pool() {
        let harness = harness(Config::default());
        let request = json!({ "recipe": carbonara("new"), "candidates": [carbonara("1")] });

        let (status, body) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;
        let response: SimilarityResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(response.has_similar_recipes);
        assert!(!response.degraded);

        let warning = response.warning.unwrap();
        assert_eq!(warning.matches.len(), 1);
        assert!((warning.matches[0].score - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_similarity_against_stored_pool() {
        let harness = harness(Config::default());

        let (status, _) = call(
            &harness.app,
            Method::PUT,
            "/recipes",
            Some(json!([carbonara("1"), { "id": "2", "title": "Chocolate Cake", "ingredients": ["flour"] }])),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let request = json!({ "recipe": carbonara("new") });
        let (_, body) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;
        let response: SimilarityResponse = serde_json::from_slice(&body).unwrap();

        assert!(response.has_similar_recipes);
        assert_eq!(response.warning.unwrap().matches[0].recipe_id, "1");
    }

    #[tokio::test]
    async fn test_similarity_no_match_is_null() {
        let harness = harness(Config::default());
        let request = json!({
            "recipe": { "id": "new", "title": "Beef Stir Fry", "ingredients": ["beef", "soy sauce"] },
            "candidates": [{ "id": "1", "title": "Chocolate Cake", "ingredients": ["flour", "sugar"] }]
        });

        let (_, body) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["has_similar_recipes"], false);
        assert!(json["warning"].is_null());
    }

    #[tokio::test]
    async fn test_similarity_rejects_malformed_recipe() {
        let harness = harness(Config::default());
        let request = json!({ "recipe": { "id": "new", "title": "Soup" }, "candidates": [] });

        let (status, _) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_similarity_uses_request_weights() {
        let harness = harness(Config::default());
        let request = json!({
            "recipe": carbonara("new"),
            "candidates": [{ "id": "1", "title": "Pasta Carbonara", "ingredients": ["rice"] }],
            "weights": { "title_weight": 1.0, "ingredients_weight": 0.0 }
        });

        let (status, body) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;
        let response: SimilarityResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        let found = &response.warning.unwrap().matches[0];
        assert!((found.score - 0.8).abs() < 1e-12);

        let title = found
            .breakdown
            .iter()
            .find(|part| part.feature == SimilarityFeature::Title)
            .unwrap();
        let ingredients = found
            .breakdown
            .iter()
            .find(|part| part.feature == SimilarityFeature::Ingredients)
            .unwrap();
        assert_eq!((title.weight, ingredients.weight), (1.0, 0.0));
        assert!((title.contribution - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_similarity_rejects_negative_weights() {
        let harness = harness(Config::default());
        let request = json!({
            "recipe": carbonara("new"),
            "candidates": [carbonara("1")],
            "weights": { "title_weight": -0.5, "ingredients_weight": 0.6 }
        });

        let (status, _) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_similarity_bad_json() {
        let harness = harness(Config::default());

        let (status, _) = call(&harness.app, Method::POST, "/similarity", Some(json!([1, 2]))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_similarity_fails_closed() {
        let harness = harness(Config::default());
        harness.memory.set_offline(true);

        let request = json!({ "recipe": carbonara("new") });
        let (status, _) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_similarity_fail_open_when_configured() {
        let harness = harness(Config {
            duplicate_check_fail_open: true,
            ..Default::default()
        });
        harness.memory.set_offline(true);

        let request = json!({ "recipe": carbonara("new") });
        let (status, body) = call(&harness.app, Method::POST, "/similarity", Some(request)).await;
        let response: SimilarityResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(!response.has_similar_recipes);
        assert!(response.degraded);
    }

    #[tokio::test]
    async fn test_interaction_is_enqueued() {
        let mut harness = harness(Config::default());
        let request = json!({
            "user_id": "ana",
            "recipe_id": "b",
            "interaction_type": "like",
            "value": 1.0,
            "features": { "relevance": 0.9, "popularity": 0.8 }
        });

        let (status, _) = call(&harness.app, Method::POST, "/interactions", Some(request)).await;
        let queued = harness.receiver.try_recv().unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(queued.interaction_type, InteractionType::Like);
        assert_eq!(queued.features.get(Feature::Popularity), 0.8);
    }

    #[tokio::test]
    async fn test_interaction_rejects_unknown_feature() {
        let harness = harness(Config::default());
        let request = json!({
            "user_id": "ana",
            "recipe_id": "b",
            "interaction_type": "save",
            "value": 1.0,
            "features": { "spiciness": 1.0 }
        });

        let (status, _) = call(&harness.app, Method::POST, "/interactions", Some(request)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_interaction_queue_full() {
        let harness = harness(Config {
            queue_capacity: 1,
            ..Default::default()
        });
        let request = json!({ "user_id": "ana", "recipe_id": "b", "interaction_type": "view", "value": 0.5 });

        let (first, _) = call(&harness.app, Method::POST, "/interactions", Some(request.clone())).await;
        let (second, _) = call(&harness.app, Method::POST, "/interactions", Some(request)).await;

        assert_eq!(first, StatusCode::ACCEPTED);
        assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_recommendations_personalized() {
        let harness = harness(Config::default());
        let request = json!({ "user_id": "ana", "candidates": candidates(), "preferred_cuisines": ["thai"] });

        let (status, body) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;
        let response: RecommendationResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(response.personalized);
        assert!(response.fallback_reason.is_none());
        assert_eq!(response.recipes.len(), 3);
        assert!(response.recipes.iter().all(|r| r.is_personalized()));
        assert_eq!(response.recipes[0].recipe_id, "b");

        for pair in response.recipes.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[tokio::test]
    async fn test_recommendations_use_trained_weights() {
        let harness = harness(Config::default());
        let mut like = harness.state.defaults.seed("ana", InteractionType::Like);
        let mut save = harness.state.defaults.seed("ana", InteractionType::Save);
        like.weights = FeatureVector::new().with(Feature::Relevance, -1.0);
        save.weights = FeatureVector::new();
        harness.state.store.upsert_weights(&like).await.unwrap();
        harness.state.store.upsert_weights(&save).await.unwrap();

        let request = json!({ "user_id": "ana", "candidates": candidates() });
        let (_, body) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;
        let response: RecommendationResponse = serde_json::from_slice(&body).unwrap();

        let order: Vec<&str> = response.recipes.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(order, ["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_recommendations_disabled() {
        let harness = harness(Config::default());
        let request = json!({ "user_id": "ana", "candidates": candidates(), "use_personalization": false });

        let (_, body) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["personalized"], false);
        assert_eq!(json["fallback_reason"], "disabled");
        assert_eq!(json["recipes"].as_array().unwrap().len(), 3);

        for recipe in json["recipes"].as_array().unwrap() {
            assert!(recipe.get("final_score").is_some());
            assert!(recipe.get("like_score").is_none());
            assert!(recipe.get("save_score").is_none());
        }
    }

    #[tokio::test]
    async fn test_recommendations_degrade_on_storage_failure() {
        let harness = harness(Config::default());
        harness.memory.set_offline(true);

        let request = json!({ "user_id": "ana", "candidates": candidates() });
        let (status, body) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;
        let response: RecommendationResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(!response.personalized);
        assert_eq!(response.fallback_reason, Some(super::FallbackReason::StorageUnavailable));
        assert_eq!(response.recipes[0].recipe_id, "b");
        assert!(response.recipes.iter().all(|r| !r.is_personalized()));
    }

    #[tokio::test]
    async fn test_recommendations_defaults_mode_on_storage_failure() {
        let harness = harness(Config {
            weights_unavailable: WeightsUnavailableMode::Defaults,
            ..Default::default()
        });
        harness.memory.set_offline(true);

        let request = json!({ "user_id": "ana", "candidates": candidates() });
        let (_, body) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;
        let response: RecommendationResponse = serde_json::from_slice(&body).unwrap();

        assert!(response.personalized);
        assert!(response.recipes.iter().all(|r| r.is_personalized()));
    }

    #[tokio::test]
    async fn test_recommendations_idempotent() {
        let harness = harness(Config::default());
        let request = json!({ "user_id": "ana", "candidates": candidates() });

        let (_, first) = call(&harness.app, Method::POST, "/recommendations", Some(request.clone())).await;
        let (_, second) = call(&harness.app, Method::POST, "/recommendations", Some(request)).await;

        let first: RecommendationResponse = serde_json::from_slice(&first).unwrap();
        let second: RecommendationResponse = serde_json::from_slice(&second).unwrap();
        assert_eq!(first.recipes, second.recipes);
    }

    #[tokio::test]
    async fn test_weights_and_metrics_endpoints() {
        let harness = harness(Config::default());

        for relevance in [0.1, 0.3, 0.5, 0.7, 0.9] {
            let interaction = scoring::Interaction {
                user_id: "ana".to_string(),
                recipe_id: "r".to_string(),
                interaction_type: InteractionType::Save,
                value: relevance,
                features: FeatureVector::new().with(Feature::Relevance, relevance),
                timestamp: chrono::Utc::now(),
            };
            harness.state.trainer.handle(interaction).await.unwrap();
        }

        let (status, body) = call(&harness.app, Method::GET, "/users/ana/weights", None).await;
        let weights: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(weights["view"]["last_updated"].is_null());
        assert!(weights["like"]["last_updated"].is_null());
        assert!(weights["save"]["last_updated"].is_string());

        let (_, body) = call(&harness.app, Method::GET, "/users/ana/metrics", None).await;
        let metrics: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(metrics.as_array().unwrap().len(), 1);
        assert_eq!(metrics[0]["interaction_type"], "save");
        assert_eq!(metrics[0]["sample_count"], 5);
    }

    #[tokio::test]
    async fn test_put_recipes_requires_ids() {
        let harness = harness(Config::default());
        let recipe = Recipe {
            title: "Soup".to_string(),
            ingredients: vec!["water".to_string()],
            ..Default::default()
        };

        let (status, _) = call(
            &harness.app,
            Method::PUT,
            "/recipes",
            Some(serde_json::to_value(vec![recipe]).unwrap()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
