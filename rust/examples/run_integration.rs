use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use twitch_integration::commands::{ChatCommandModule, SOUND_COMMANDS};
use twitch_integration::config::IntegrationConfig;
use twitch_integration::helix::HelixClient;
use twitch_integration::module::{Module, NotificationHandler};
use twitch_integration::stream::client::EventStreamClient;
use twitch_integration::stream::dispatch::HandlerError;
use twitch_integration::stream::events::TopicEvent;
use twitch_integration::stream::proto::Envelope;
use twitch_integration::supervisor::Supervisor;

/// Prints every notification as a typed event.
struct EventPrinter;

#[async_trait]
impl NotificationHandler for EventPrinter {
    async fn handle_notification(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let Some(subscription) = envelope.as_subscription() else {
            return Ok(());
        };
        match subscription.event()? {
            TopicEvent::ChatMessage(event) => {
                println!("{} said {:?}", event.chatter_user_name, event.message.text)
            }
            TopicEvent::PointsRedemptionAdd(event) => {
                println!("{} redeemed {:?}", event.user_name, event.reward.title)
            }
            TopicEvent::Cheer(event) => println!(
                "{} cheered {} bits",
                event.user_name.as_deref().unwrap_or("anonymous"),
                event.bits
            ),
            TopicEvent::CharityDonation(event) => println!(
                "{} donated {:.2} {} to {}",
                event.user_name,
                event.amount.as_decimal(),
                event.amount.currency,
                event.charity_name
            ),
            other => println!("{other:?}"),
        }
        Ok(())
    }
}

impl Module for EventPrinter {
    fn name(&self) -> &str {
        "event_printer"
    }

    fn notifications(self: Arc<Self>) -> Option<Arc<dyn NotificationHandler>> {
        Some(self)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (config, sources) = IntegrationConfig::load(config_path.as_deref())?;
    tracing::info!(
        event = "config_loaded",
        file = ?sources.file,
        env_overrides = ?sources.env_overrides
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let credentials = config.credential_provider()?;
        let helix = HelixClient::new(credentials.clone())?.with_base_url(&config.stream.api_base_url);
        let target = helix
            .resolve_target(&config.stream.login_name, config.viewer_login())
            .await?;

        let mut supervisor = Supervisor::new(&config.runtime);
        let (sound_effects, mut commands) = ChatCommandModule::new("sound_effects", &SOUND_COMMANDS);
        supervisor.register(sound_effects);
        supervisor.register(Arc::new(EventPrinter));

        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                println!("{} triggered {:?}", command.chatter, command.command);
            }
        });

        let client = EventStreamClient::new(credentials, helix, target, supervisor.handlers())
            .with_endpoint(&config.stream.websocket_url)
            .with_handshake_timeout(config.runtime.handshake_timeout());

        supervisor
            .run(client, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        Ok::<(), Box<dyn Error>>(())
    })
}
