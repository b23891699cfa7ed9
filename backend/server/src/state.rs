use std::sync::Arc;

use anyhow::Result;
use scoring::{DefaultWeights, Interaction, WeightLearner};
use tokio::sync::mpsc::{Receiver, Sender, channel};

use super::{
    config::{Config, StoreKind},
    database::{Store, init_redis},
    training::Trainer,
};

pub struct State {
    pub config: Config,
    pub store: Store,
    pub defaults: Arc<DefaultWeights>,
    pub trainer: Trainer,
    pub training_queue: Sender<Interaction>,
}

impl State {
    pub async fn new(config: Config) -> Result<(Arc<Self>, Receiver<Interaction>)> {
        let store = match config.store {
            StoreKind::Redis => Store::Redis(init_redis(&config.redis_url).await?),
            StoreKind::Memory => Store::memory(),
        };

        let defaults = config.load_default_weights()?;

        Ok(Self::with_store(config, store, defaults))
    }

    pub fn with_store(
        config: Config,
        store: Store,
        defaults: DefaultWeights,
    ) -> (Arc<Self>, Receiver<Interaction>) {
        let defaults = Arc::new(defaults);
        let (training_queue, receiver) = channel(config.queue_capacity);

        let trainer = Trainer {
            store: store.clone(),
            defaults: defaults.clone(),
            learner: WeightLearner::new(config.training),
            store_timeout: config.store_timeout,
        };

        let state = Arc::new(Self {
            config,
            store,
            defaults,
            trainer,
            training_queue,
        });

        (state, receiver)
    }
}
