#[cfg(test)]
mod tests {
    use hearth_bus::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn configured_bus(names: &[&str]) -> MessageBus {
        let bus = MessageBus::new(BusConfig::default());
        for name in names {
            bus.add_subscription(name).unwrap();
        }
        bus.app_configured();
        bus
    }

    async fn drain(bus: &MessageBus, name: &str) -> Vec<Request> {
        let mut received = Vec::new();
        while let Ok(envelope) = bus.pull(name, None).await {
            received.push(envelope.into_parts().0);
        }
        received
    }

    #[tokio::test]
    async fn test_fifo_per_target() {
        let bus = configured_bus(&["lights", "ui"]);

        for i in 0..50 {
            let request = Request::command("set_level").to("lights").with_param("level", i);
            bus.push("ui", request, None).await.unwrap();
        }

        let levels: Vec<i64> = drain(&bus, "lights")
            .await
            .iter()
            .map(|request| request.params().get("level").unwrap())
            .collect();
        assert_eq!(levels, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_no_self_delivery() {
        let bus = configured_bus(&["lights"]);

        let unicast = bus.push("lights", Request::command("turn_on").to("lights"), None).await;
        assert!(matches!(unicast, Err(BusError::Internal { .. })));

        let timed = bus
            .push("lights", Request::event("lights.changed").to("lights"), Some(Duration::from_secs(1)))
            .await;
        assert!(matches!(timed, Err(BusError::Internal { .. })));

        assert!(drain(&bus, "lights").await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let bus = configured_bus(&["sender", "a", "b", "c"]);

        let result = bus.push("sender", Request::event("system.tick"), None).await.unwrap();
        assert!(result.is_none());

        for name in ["a", "b", "c"] {
            let received = drain(&bus, name).await;
            assert_eq!(received.len(), 1, "{name} should see the broadcast once");
            assert_eq!(received[0].sender(), "sender");
        }
        assert!(drain(&bus, "sender").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_monotonicity() {
        let bus = configured_bus(&["sleepy", "ui"]);
        let timeout = Duration::from_millis(250);
        let started = Instant::now();

        let result = bus
            .push("ui", Request::command("wake_up").to("sleepy").with_param("x", 1), Some(timeout))
            .await;

        assert!(started.elapsed() >= timeout);
        match result {
            Err(BusError::NoResponse { target, timeout: reported, request, .. }) => {
                assert_eq!(target, "sleepy");
                assert_eq!(reported, timeout);
                assert_eq!(request.name(), "wake_up");
                assert_eq!(request.sender(), "ui");
                assert_eq!(request.params().get::<i64>("x").unwrap(), 1);
            },
            other => panic!("expected NoResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unicast_round_trip() {
        let bus = configured_bus(&["lights", "ui"]);

        let server = bus.clone();
        let responder = tokio::spawn(async move {
            let envelope = server.pull("lights", Some(Duration::from_secs(2))).await.unwrap();
            assert!(envelope.expects_reply());
            let (request, responder) = envelope.into_parts();
            let id: String = request.params().get("light_id").unwrap();
            responder.respond(Response::ok(json!({ "light_id": id, "on": true })))
        });

        let response = bus
            .push(
                "ui",
                Request::command("turn_on").to("lights").with_param("light_id", "kitchen"),
                Some(Duration::from_secs(2)),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(responder.await.unwrap());
        assert_eq!(response.data(), Some(&json!({ "light_id": "kitchen", "on": true })));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_a_queue_fault() {
        let bus = configured_bus(&["lights", "ui"]);

        let server = bus.clone();
        tokio::spawn(async move {
            let envelope = server.pull("lights", Some(Duration::from_secs(2))).await.unwrap();
            drop(envelope);
        });

        let result =
            bus.push("ui", Request::command("turn_on").to("lights"), Some(Duration::from_secs(2))).await;
        let err = result.unwrap_err();
        assert!(matches!(err, BusError::Queue { .. }));
        assert!(err.is_bus_failure());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_fire_and_forget() {
        let bus = configured_bus(&["lights", "ui"]);

        let result = bus.push("ui", Request::command("turn_on").to("lights"), Some(Duration::ZERO)).await;
        assert!(result.unwrap().is_none());

        let envelope = bus.pull("lights", None).await.unwrap();
        assert!(!envelope.expects_reply());
    }

    #[tokio::test]
    async fn test_unknown_target_after_configuration() {
        let bus = configured_bus(&["ui"]);
        let result = bus.push("ui", Request::command("turn_on").to("ghost"), None).await;
        assert!(matches!(result, Err(BusError::InvalidModule { module, .. }) if module == "ghost"));
    }

    #[tokio::test]
    async fn test_startup_buffering() {
        let bus = MessageBus::new(BusConfig::default());
        bus.add_subscription("early").unwrap();

        bus.push("early", Request::event("system.booting"), None).await.unwrap();
        bus.push("early", Request::event("system.network.up"), None).await.unwrap();
        assert_eq!(bus.pending_startup_messages(), 2);

        bus.add_subscription("late").unwrap();
        assert!(drain(&bus, "late").await.is_empty());

        bus.app_configured();
        bus.add_subscription("after").unwrap();

        let names: Vec<String> =
            drain(&bus, "late").await.iter().map(|request| request.name().to_owned()).collect();
        assert_eq!(names, vec!["system.booting".to_owned(), "system.network.up".to_owned()]);
        assert!(drain(&bus, "early").await.is_empty());
        assert!(drain(&bus, "after").await.is_empty());
    }

    #[tokio::test]
    async fn test_startup_flag_marks_early_unicast() {
        let bus = MessageBus::new(BusConfig::default());
        bus.add_subscription("lights").unwrap();

        bus.push("ui", Request::command("turn_on").to("lights"), None).await.unwrap();
        bus.app_configured();
        bus.push("ui", Request::command("turn_off").to("lights"), None).await.unwrap();

        let first = bus.pull("lights", None).await.unwrap();
        let second = bus.pull("lights", None).await.unwrap();
        assert!(first.is_startup());
        assert!(!second.is_startup());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_waits_for_late_target() {
        let bus = MessageBus::new(BusConfig::default());

        let late = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            late.add_subscription("lights").unwrap();
            let envelope = late.pull("lights", Some(Duration::from_secs(1))).await.unwrap();
            envelope.into_parts().1.respond(Response::ok("on"));
        });

        let response = bus
            .push("ui", Request::command("turn_on").to("lights"), Some(Duration::from_secs(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.data(), Some(&json!("on")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_expiry_reports_startup_timeout() {
        let startup = Duration::from_millis(200);
        let bus = MessageBus::new(BusConfig::default().with_startup_timeout(startup));
        let started = Instant::now();

        let result = bus.push("ui", Request::command("turn_on").to("lights"), None).await;

        assert!(started.elapsed() >= startup);
        assert!(
            matches!(result, Err(BusError::NoResponse { timeout, .. }) if timeout == startup)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_ends_grace_period() {
        let bus = MessageBus::new(BusConfig::default());

        let controller = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            controller.app_configured();
        });

        let result =
            bus.push("ui", Request::command("turn_on").to("lights"), Some(Duration::from_secs(5))).await;
        assert!(matches!(result, Err(BusError::InvalidModule { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_subscribing_target() {
        let bus = MessageBus::new(BusConfig::default());
        let timeout = Duration::from_millis(200);
        let started = Instant::now();

        let result = bus.push("a", Request::command("missing").to("b"), Some(timeout)).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < bus.config().startup_timeout());
        assert!(matches!(result, Err(BusError::NoResponse { timeout: t, .. }) if t == timeout));
    }

    #[tokio::test]
    async fn test_stopped_bus_refuses_every_push() {
        let bus = configured_bus(&["lights", "ui"]);
        bus.stop();
        assert!(bus.is_stopped());

        let broadcast = bus.push("ui", Request::event("system.tick"), None).await.unwrap_err();
        let unicast = bus
            .push("ui", Request::command("turn_on").to("lights"), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();

        for err in [broadcast, unicast] {
            assert!(matches!(err, BusError::Stopped { .. }));
            assert!(err.is_bus_failure());
            assert_eq!(err.to_string(), "Bus stopped");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_grace_period() {
        let bus = MessageBus::new(BusConfig::default());

        let controller = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            controller.stop();
        });

        let result = bus.push("ui", Request::command("turn_on").to("lights"), None).await;
        assert!(matches!(result, Err(BusError::Stopped { .. })));
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let bus = configured_bus(&["ui"]);

        let both: Request =
            serde_json::from_value(json!({ "command": "turn_on", "event": "lights.on" })).unwrap();
        assert!(matches!(bus.push("ui", both, None).await, Err(BusError::InvalidMessage { .. })));

        let neither: Request = serde_json::from_value(json!({ "to": "lights" })).unwrap();
        assert!(matches!(bus.push("ui", neither, None).await, Err(BusError::InvalidMessage { .. })));

        let blank = Request::command("").to("lights");
        assert!(matches!(bus.push("ui", blank, None).await, Err(BusError::InvalidParameter { .. })));
    }

    #[tokio::test]
    async fn test_subscription_management() {
        let bus = configured_bus(&["b", "a"]);
        assert_eq!(bus.subscriptions(), vec!["a".to_owned(), "b".to_owned()]);
        assert!(bus.is_subscribed("a"));

        bus.remove_subscription("a").unwrap();
        assert!(!bus.is_subscribed("a"));
        assert!(matches!(bus.remove_subscription("a"), Err(BusError::InvalidModule { .. })));
    }

    #[tokio::test]
    async fn test_pull_outcomes() {
        let bus = configured_bus(&["lights"]);

        assert!(matches!(bus.pull("ghost", None).await, Err(BusError::InvalidModule { .. })));
        assert!(matches!(bus.pull("lights", None).await, Err(BusError::NoMessageAvailable { .. })));
        assert!(matches!(
            bus.pull("lights", Some(Duration::from_millis(20))).await,
            Err(BusError::NoMessageAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_pull_fails_when_unsubscribed_while_waiting() {
        let bus = configured_bus(&["lights"]);

        let waiter = bus.clone();
        let pending = tokio::spawn(async move { waiter.pull("lights", Some(Duration::from_secs(5))).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.remove_subscription("lights").unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(BusError::Queue { .. })));
    }

    #[tokio::test]
    async fn test_zero_lifetime_purges_on_every_call() {
        let bus = MessageBus::new(BusConfig::default().with_subscription_lifetime(Duration::ZERO));
        bus.add_subscription("a").unwrap();
        bus.add_subscription("b").unwrap();

        assert_eq!(bus.purge_subscriptions(), vec!["a".to_owned(), "b".to_owned()]);
        assert!(bus.subscriptions().is_empty());

        bus.add_subscription("a").unwrap();
        assert_eq!(bus.purge_subscriptions(), vec!["a".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulling_keeps_subscription_alive() {
        let bus = MessageBus::new(
            BusConfig::default().with_subscription_lifetime(Duration::from_secs(10)),
        );
        bus.add_subscription("active").unwrap();
        bus.add_subscription("gone").unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        let _ = bus.pull("active", None).await;
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(bus.purge_subscriptions(), vec!["gone".to_owned()]);
        assert!(bus.is_subscribed("active"));
    }
}
