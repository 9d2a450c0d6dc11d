//! End-to-end conventions: a grain that polls on a command timer and
//! notifies a client-side observer through a registry-created proxy.

use async_trait::async_trait;
use futures::FutureExt;
use loam_grains::{
    BindingCatalog, CapabilityType, CommandEnvelope, DispatchError, GrainCommand, GrainId,
    GrainTimers, InterfaceDescriptor, ObserverProxy, ObserverRegistry, ProducerDescriptor,
    SelfDispatch, TimerId, TokioScheduler,
};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct PollMarket {
    venue: &'static str,
}
impl GrainCommand for PollMarket {}

/// Test bus: runs the grain's command handler inline, one turn at a time.
struct InlineBus {
    polls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl SelfDispatch for InlineBus {
    async fn dispatch(&self, envelope: CommandEnvelope) -> Result<(), DispatchError> {
        let command = envelope
            .downcast::<PollMarket>()
            .expect("only PollMarket is scheduled in this test");
        self.polls.lock().push(command.venue);
        Ok(())
    }
}

struct PriceObserver;
impl CapabilityType for PriceObserver {
    fn descriptor() -> InterfaceDescriptor {
        InterfaceDescriptor::minimal::<PriceObserver>()
    }
}

struct PriceCatalog {
    live_proxies: Arc<AtomicU64>,
}

impl BindingCatalog for PriceCatalog {
    fn scan(&self) -> Vec<ProducerDescriptor> {
        let on_create = Arc::clone(&self.live_proxies);
        let on_destroy = Arc::clone(&self.live_proxies);
        vec![ProducerDescriptor {
            produced: PriceObserver::descriptor(),
            declares_observer: true,
            declares_grain: false,
            create: Arc::new(move |observer| {
                let live = Arc::clone(&on_create);
                async move {
                    live.fetch_add(1, Ordering::Relaxed);
                    Ok(ObserverProxy::new::<PriceObserver>(Box::new(observer)))
                }
                .boxed()
            }),
            destroy: Arc::new(move |_proxy| {
                let live = Arc::clone(&on_destroy);
                async move {
                    live.fetch_sub(1, Ordering::Relaxed);
                    Ok(())
                }
                .boxed()
            }),
        }]
    }
}

#[tokio::test(start_paused = true)]
async fn command_timer_drives_polling_until_unregistered() {
    let bus = Arc::new(InlineBus {
        polls: Mutex::new(Vec::new()),
    });
    let timers = GrainTimers::new(
        GrainId::new(),
        Arc::new(TokioScheduler),
        Arc::clone(&bus) as Arc<dyn SelfDispatch>,
    );

    let id = timers.register_command_timer(
        Duration::from_millis(100),
        Duration::from_millis(100),
        PollMarket { venue: "polygon" },
    );
    assert_eq!(id, TimerId::for_command::<PollMarket>());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(bus.polls.lock().as_slice(), ["polygon", "polygon"]);

    timers.unregister_command::<PollMarket>().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(bus.polls.lock().len(), 2, "unregistered timer must stop dispatching");
}

#[tokio::test]
async fn observer_proxy_lifecycle_is_caller_owned() {
    let live_proxies = Arc::new(AtomicU64::new(0));
    let registry = ObserverRegistry::new(PriceCatalog {
        live_proxies: Arc::clone(&live_proxies),
    });

    let observer: Arc<dyn Any + Send + Sync> = Arc::new("price ticker widget");
    let proxy = registry.create_proxy::<PriceObserver>(observer).await.unwrap();
    assert_eq!(live_proxies.load(Ordering::Relaxed), 1);

    registry.delete_proxy::<PriceObserver>(proxy).await.unwrap();
    assert_eq!(live_proxies.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn deactivation_drop_cancels_all_timers() {
    let bus = Arc::new(InlineBus {
        polls: Mutex::new(Vec::new()),
    });
    {
        let timers = GrainTimers::new(
            GrainId::new(),
            Arc::new(TokioScheduler),
            Arc::clone(&bus) as Arc<dyn SelfDispatch>,
        );
        timers.register_command_timer(
            Duration::from_millis(100),
            Duration::from_millis(100),
            PollMarket { venue: "polygon" },
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(bus.polls.lock().len(), 1);
        // Grain deactivates: subsystem dropped with a timer still registered
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(bus.polls.lock().len(), 1, "dropped subsystem leaves only inert handles");
}
