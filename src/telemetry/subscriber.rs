use super::TelemetryCache;
use crate::config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// MQTT subscriber that feeds IMU messages into a [`TelemetryCache`]
pub struct TelemetrySubscriber {
    config: MqttConfig,
    client_id: String,
    cache: TelemetryCache,
    cancellation_token: CancellationToken,
}

impl TelemetrySubscriber {
    pub fn new(config: MqttConfig, client_id: String, cache: TelemetryCache) -> Self {
        Self {
            config,
            client_id,
            cache,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Token that stops the receive loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Spawn the receive loop on the tokio runtime
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut options = MqttOptions::new(
            self.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        info!(
            "Starting telemetry subscriber for {}:{} topic '{}'",
            self.config.host, self.config.port, self.config.topic
        );

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("Telemetry subscriber stopping");
                    if let Err(e) = client.disconnect().await {
                        debug!("MQTT disconnect failed: {}", e);
                    }
                    break;
                }
                should_continue = self.poll_once(&client, &mut eventloop) => {
                    if !should_continue {
                        break;
                    }
                }
            }
        }
    }

    /// Handle one event loop notification; returns false once the client is gone
    async fn poll_once(&self, client: &AsyncClient, eventloop: &mut EventLoop) -> bool {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(
                    "Connected to MQTT broker at {}:{} ({:?})",
                    self.config.host, self.config.port, ack.code
                );
                // Subscriptions do not survive a clean-session reconnect
                if let Err(e) = client.subscribe(&self.config.topic, QoS::AtMostOnce).await {
                    error!("Failed to subscribe to {}: {}", self.config.topic, e);
                    return false;
                }
                info!("Subscribed to topic: {}", self.config.topic);
                true
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                apply_publish(&self.cache, &publish);
                true
            }
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "MQTT connection error: {}. Reconnecting in {}s",
                    e, self.config.reconnect_delay_secs
                );
                tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay_secs)).await;
                true
            }
        }
    }
}

/// Feed one published message into the cache; returns true when it was applied
fn apply_publish(cache: &TelemetryCache, publish: &Publish) -> bool {
    match cache.ingest(&publish.payload) {
        Ok(true) => {
            debug!("Updated IMU data from {}", publish.topic);
            true
        }
        Ok(false) => false,
        Err(e) => {
            error!(
                "Error processing MQTT message on {}: {} ({})",
                publish.topic,
                e,
                String::from_utf8_lossy(&publish.payload)
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;

    fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_publish_updates_cache() {
        let cache = TelemetryCache::new();
        let publish = Publish::new(
            "status/imu",
            QoS::AtMostOnce,
            r#"{"roll":1.5,"pitch":-0.2,"yaw":10.0}"#,
        );

        assert!(apply_publish(&cache, &publish));
        let sample = cache.read();
        assert_eq!(sample.roll, Some(json!(1.5)));
        assert_eq!(sample.yaw, Some(json!(10.0)));
    }

    #[test]
    fn test_malformed_publish_leaves_cache_alone() {
        let cache = TelemetryCache::new();
        cache.update(json!(1.0), json!(2.0), json!(3.0));

        let garbage = Publish::new("status/imu", QoS::AtMostOnce, "not json");
        let partial = Publish::new("status/imu", QoS::AtMostOnce, r#"{"roll":9.0}"#);

        assert!(!apply_publish(&cache, &garbage));
        assert!(!apply_publish(&cache, &partial));
        assert_eq!(cache.read().roll, Some(json!(1.0)));
    }

    #[tokio::test]
    async fn test_subscriber_survives_refused_connection_and_stops_on_cancel() {
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port(),
            topic: "status/".to_string(),
            client_id: None,
            keep_alive_secs: 5,
            reconnect_delay_secs: 0,
        };
        let subscriber = TelemetrySubscriber::new(config, "camsnap_test".to_string(), TelemetryCache::new());
        let token = subscriber.cancellation_token();
        let handle = subscriber.start();

        // Connection errors keep the loop alive
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("subscriber did not stop after cancellation")
            .unwrap();
    }
}
