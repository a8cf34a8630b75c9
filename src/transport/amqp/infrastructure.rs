use futures_util::future::join_all;
use tracing::{info, warn};

use super::AmqpTransport;
use crate::broker::{BrokerChannel, ExchangeOptions, QueueOptions};
use crate::progress::Progress;
use crate::transport::ExchangeSpec;

type Target<'a> = (&'a ExchangeSpec, String);

impl<C: BrokerChannel> AmqpTransport<C> {
    /// Declare exchanges and named queues, one future per spec.
    pub(super) async fn create(&self, targets: &[Target<'_>], progress: &dyn Progress) {
        join_all(
            targets
                .iter()
                .map(|(spec, exchange)| self.create_one(spec, exchange, progress)),
        )
        .await;
    }

    async fn create_one(&self, spec: &ExchangeSpec, exchange: &str, progress: &dyn Progress) {
        let alias = &spec.alias;
        match self
            .channel
            .exchange_declare(exchange, ExchangeOptions::durable())
            .await
        {
            Ok(()) => {
                info!(alias = %alias, exchange, "exchange declared");
                progress.line(&format!("Exchange with name {alias} created properly"));
            }
            Err(err) => {
                warn!(alias = %alias, exchange, error = %err, "exchange declare failed");
                progress.line(&format!(
                    "Exchange with name {alias} could not be created. Reason - {}",
                    err.reason()
                ));
            }
        }

        let Some(queue) = &spec.queue else {
            return;
        };
        if let Err(err) = self.channel.queue_declare(queue, QueueOptions::durable()).await {
            warn!(queue = %queue, error = %err, "queue declare failed");
            progress.line(&format!(
                "Queue with name {queue} could not be created. Reason - {}",
                err.reason()
            ));
            return;
        }
        progress.line(&format!("Queue with name {queue} created properly"));

        match self.channel.queue_bind(queue, exchange).await {
            Ok(()) => progress.line(&format!(
                "Queue with name {queue} bound properly to exchange with name {alias}"
            )),
            Err(err) => {
                warn!(queue = %queue, exchange, error = %err, "queue bind failed");
                progress.line(&format!(
                    "Queue with name {queue} could not be bound to exchange with name {alias}. Reason - {}",
                    err.reason()
                ));
            }
        }
    }

    /// Delete exchanges and named queues, one future per spec.
    pub(super) async fn drop_all(&self, targets: &[Target<'_>], progress: &dyn Progress) {
        join_all(
            targets
                .iter()
                .map(|(spec, exchange)| self.drop_one(spec, exchange, progress)),
        )
        .await;
    }

    async fn drop_one(&self, spec: &ExchangeSpec, exchange: &str, progress: &dyn Progress) {
        let alias = &spec.alias;
        match self.channel.exchange_delete(exchange).await {
            Ok(()) => progress.line(&format!("Exchange with name {alias} deleted properly")),
            Err(err) => progress.line(&format!(
                "Exchange with name {alias} was impossible to be deleted. Reason - {}",
                err.reason()
            )),
        }

        let Some(queue) = &spec.queue else {
            return;
        };
        match self.channel.queue_delete(queue).await {
            Ok(()) => progress.line(&format!("Queue with name {queue} deleted properly")),
            Err(err) => progress.line(&format!(
                "Queue with name {queue} was impossible to be deleted. Reason - {}",
                err.reason()
            )),
        }
    }

    /// Passive checks only; nothing is created.
    pub(super) async fn check(&self, targets: &[Target<'_>], progress: &dyn Progress) {
        join_all(
            targets
                .iter()
                .map(|(spec, exchange)| self.check_one(spec, exchange, progress)),
        )
        .await;
    }

    async fn check_one(&self, spec: &ExchangeSpec, exchange: &str, progress: &dyn Progress) {
        let alias = &spec.alias;
        match self
            .channel
            .exchange_declare(exchange, ExchangeOptions::passive())
            .await
        {
            Ok(()) => progress.line(&format!("Exchange with name {alias} exists")),
            Err(err) => progress.line(&format!(
                "Exchange with name {alias} does not exist. Reason - {}",
                err.reason()
            )),
        }

        let Some(queue) = &spec.queue else {
            return;
        };
        match self.channel.queue_declare(queue, QueueOptions::passive()).await {
            Ok(_) => progress.line(&format!("Queue with name {queue} exists")),
            Err(err) => progress.line(&format!(
                "Queue with name {queue} does not exist. Reason - {}",
                err.reason()
            )),
        }
    }
}
