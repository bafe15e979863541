use crate::capture::frame::DEFAULT_JPEG_QUALITY;
use crate::capture::session::{Session, SkipReason, TickDecision, Ticket};
use crate::prelude::{
    ClientError, ClientResult, FrameSource, SubmissionRequest, SubmitTarget, VerificationService,
    SETTLE_DELAY,
};
use crate::protocol::VerificationVerdict;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Timer period and post-completion settle delay for a capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    pub period: Duration,
    pub settle: Duration,
}

impl CaptureTiming {
    pub fn for_mode(mode: crate::prelude::CaptureMode) -> Self {
        Self {
            period: mode.default_period(),
            settle: SETTLE_DELAY,
        }
    }
}

/// What the loop reports to whoever renders it.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Started,
    DeviceError(ClientError),
    Submitting { target: SubmitTarget, bytes: usize },
    Verdict(VerificationVerdict),
    Failed(ClientError),
    Stopped(MetricsSnapshot),
}

type Completion = (Ticket, ClientResult<VerificationVerdict>);

/// Drives a [`Session`] from a recurring timer until cancelled.
///
/// Each accepted tick spawns one submission task; the session's busy state
/// keeps ticks from overlapping it. Cancelling stops the timer and releases
/// the source; a submission still in flight finishes on its own and its
/// result is dropped.
pub struct CaptureLoop<S, V> {
    session: Session,
    source: S,
    service: Arc<V>,
    timing: CaptureTiming,
    jpeg_quality: u8,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S, V> CaptureLoop<S, V>
where
    S: FrameSource,
    V: VerificationService,
{
    pub fn new(session: Session, source: S, service: Arc<V>) -> Self {
        let timing = CaptureTiming::for_mode(session.mode());
        let logger = LogManager::new(format!("capture:{}", session.mode()));
        Self {
            session,
            source,
            service,
            timing,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            metrics: Arc::new(MetricsRecorder::new()),
            logger,
        }
    }

    pub fn with_timing(mut self, timing: CaptureTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub async fn run(
        mut self,
        cancel: CancellationToken,
        events: UnboundedSender<CaptureEvent>,
    ) -> Session {
        if let Err(err) = self.source.open() {
            self.logger.warn(&format!("camera unavailable: {}", err));
            let _ = events.send(CaptureEvent::DeviceError(err));
            return self.session;
        }
        self.session.start();
        self.logger.record(&format!(
            "started, period {:?}, settle {:?}",
            self.timing.period, self.timing.settle
        ));
        let _ = events.send(CaptureEvent::Started);

        let now = Instant::now();
        let first_tick = if self.session.mode().fires_immediately() {
            now
        } else {
            now + self.timing.period
        };
        let mut ticker = time::interval_at(first_tick, self.timing.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut settling: Option<(Ticket, Instant)> = None;

        loop {
            let settle_deadline = settling.map(|(_, at)| at).unwrap_or(now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some((ticket, outcome)) = done_rx.recv() => {
                    if self.finish(ticket, outcome, &events) {
                        settling = Some((ticket, Instant::now() + self.timing.settle));
                    }
                }
                _ = time::sleep_until(settle_deadline), if settling.is_some() => {
                    if let Some((ticket, _)) = settling.take() {
                        self.session.settle(ticket);
                    }
                }
                _ = ticker.tick() => self.on_tick(&done_tx, &events),
            }
        }

        self.source.release();
        self.session.stop();
        let snapshot = self.metrics.snapshot();
        self.logger.record(&format!("stopped: {}", snapshot));
        let _ = events.send(CaptureEvent::Stopped(snapshot));
        self.session
    }

    fn on_tick(&mut self, done_tx: &UnboundedSender<Completion>, events: &UnboundedSender<CaptureEvent>) {
        let source = &mut self.source;
        let decision = match self.session.try_begin(|| source.grab()) {
            Ok(decision) => decision,
            Err(err) => {
                self.metrics.record_failure();
                self.logger.warn(&format!("frame grab failed: {}", err));
                let _ = events.send(CaptureEvent::Failed(err));
                return;
            }
        };

        let (ticket, frame) = match decision {
            TickDecision::Capture(ticket, frame) => (ticket, frame),
            TickDecision::Skip(SkipReason::Busy) => {
                self.metrics.record_skipped_busy();
                self.logger.trace("tick skipped: submission in flight");
                return;
            }
            TickDecision::Skip(SkipReason::NoFrame) => {
                self.metrics.record_skipped_no_frame();
                self.logger.trace("tick skipped: no frame yet");
                return;
            }
            TickDecision::Skip(SkipReason::Idle) => return,
        };

        let target = self.session.submission_target();
        let encoded = match frame.encode(self.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(err) => {
                let _ = done_tx.send((ticket, Err(err)));
                return;
            }
        };

        self.metrics.record_submitted();
        let _ = events.send(CaptureEvent::Submitting {
            target: target.clone(),
            bytes: encoded.bytes.len(),
        });

        let service = self.service.clone();
        let done = done_tx.clone();
        tokio::spawn(async move {
            let outcome = service
                .verify(SubmissionRequest {
                    target,
                    frame: encoded,
                })
                .await;
            let _ = done.send((ticket, outcome));
        });
    }

    fn finish(
        &mut self,
        ticket: Ticket,
        outcome: ClientResult<VerificationVerdict>,
        events: &UnboundedSender<CaptureEvent>,
    ) -> bool {
        let verdict = match outcome {
            Ok(verdict) => {
                self.metrics.record_verdict();
                self.logger.record(&format!(
                    "verdict success={} message={:?}",
                    verdict.success, verdict.message
                ));
                let _ = events.send(CaptureEvent::Verdict(verdict.clone()));
                Some(verdict)
            }
            Err(err) => {
                self.metrics.record_failure();
                self.logger.warn(&format!("submission failed: {}", err));
                let _ = events.send(CaptureEvent::Failed(err));
                None
            }
        };
        self.session.complete(ticket, verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::CaptureMode;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct PatternSource {
        warmup: usize,
        grabs: usize,
        deny: bool,
    }

    impl PatternSource {
        fn ready() -> Self {
            Self {
                warmup: 0,
                grabs: 0,
                deny: false,
            }
        }
    }

    impl FrameSource for PatternSource {
        fn open(&mut self) -> ClientResult<()> {
            if self.deny {
                Err(ClientError::DeviceAccessDenied("permission refused".into()))
            } else {
                Ok(())
            }
        }

        fn grab(&mut self) -> ClientResult<Option<RgbImage>> {
            self.grabs += 1;
            if self.grabs <= self.warmup {
                return Ok(None);
            }
            Ok(Some(RgbImage::from_pixel(16, 12, Rgb([90, 90, 90]))))
        }

        fn release(&mut self) {}
    }

    struct SlowBackend {
        latency: Duration,
        fail: bool,
        calls: Mutex<Vec<(Instant, SubmitTarget)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowBackend {
        fn new(latency: Duration) -> Arc<Self> {
            Self::build(latency, false)
        }

        fn failing(latency: Duration) -> Arc<Self> {
            Self::build(latency, true)
        }

        fn build(latency: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                latency,
                fail,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
        }
    }

    impl VerificationService for SlowBackend {
        fn verify(
            &self,
            request: SubmissionRequest,
        ) -> impl std::future::Future<Output = ClientResult<VerificationVerdict>> + Send {
            async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((Instant::now(), request.target.clone()));
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(current, Ordering::SeqCst);
                time::sleep(self.latency).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if self.fail {
                    Err(ClientError::TransportFailure("connection reset".into()))
                } else {
                    Ok(VerificationVerdict {
                        success: true,
                        message: "Checked in".into(),
                        ..Default::default()
                    })
                }
            }
        }
    }

    async fn run_for(
        mode: CaptureMode,
        identity: Option<&str>,
        source: PatternSource,
        backend: Arc<SlowBackend>,
        duration: Duration,
    ) -> (Session, UnboundedReceiver<CaptureEvent>) {
        let session = Session::new(mode, identity.map(String::from)).unwrap();
        let capture = CaptureLoop::new(session, source, backend);
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(capture.run(cancel.clone(), tx));
        time::sleep(duration).await;
        cancel.cancel();
        (handle.await.unwrap(), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<CaptureEvent>) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_never_sees_overlapping_submissions() {
        let backend = SlowBackend::new(Duration::from_secs(5));
        let (_, mut rx) = run_for(
            CaptureMode::CheckIn,
            None,
            PatternSource::ready(),
            backend.clone(),
            Duration::from_secs(30),
        )
        .await;

        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(backend.call_times().len() >= 2);
        let stopped = drain(&mut rx).into_iter().find_map(|event| match event {
            CaptureEvent::Stopped(snapshot) => Some(snapshot),
            _ => None,
        });
        assert!(stopped.unwrap().skipped_busy > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn next_submission_waits_for_latency_plus_settle() {
        let latency = Duration::from_secs(2);
        let backend = SlowBackend::new(latency);
        run_for(
            CaptureMode::CheckOut,
            None,
            PatternSource::ready(),
            backend.clone(),
            Duration::from_secs(20),
        )
        .await;

        let times = backend.call_times();
        assert!(times.len() >= 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= latency + SETTLE_DELAY);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn denied_camera_leaves_session_idle() {
        let backend = SlowBackend::new(Duration::from_millis(10));
        let source = PatternSource {
            deny: true,
            ..PatternSource::ready()
        };
        let (session, mut rx) = run_for(
            CaptureMode::CheckIn,
            None,
            source,
            backend.clone(),
            Duration::from_secs(5),
        )
        .await;

        assert!(!session.is_active());
        assert!(backend.call_times().is_empty());
        let events = drain(&mut rx);
        assert!(matches!(
            events.first(),
            Some(CaptureEvent::DeviceError(ClientError::DeviceAccessDenied(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn online_mode_verifies_immediately_with_identity() {
        let backend = SlowBackend::new(Duration::from_millis(100));
        run_for(
            CaptureMode::Online,
            Some("R1"),
            PatternSource::ready(),
            backend.clone(),
            Duration::from_secs(1),
        )
        .await;

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, SubmitTarget::Online { reg_no: "R1".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_without_a_frame_are_silent() {
        let backend = SlowBackend::new(Duration::from_millis(100));
        let source = PatternSource {
            warmup: 2,
            ..PatternSource::ready()
        };
        let (_, mut rx) = run_for(
            CaptureMode::CheckIn,
            None,
            source,
            backend.clone(),
            Duration::from_millis(4600),
        )
        .await;

        assert_eq!(backend.call_times().len(), 1);
        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|event| matches!(event, CaptureEvent::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_polling() {
        let backend = SlowBackend::failing(Duration::from_millis(200));
        let (session, mut rx) = run_for(
            CaptureMode::CheckIn,
            None,
            PatternSource::ready(),
            backend.clone(),
            Duration::from_secs(10),
        )
        .await;

        assert!(backend.call_times().len() >= 4);
        assert!(session.last_result().is_none());
        let failures = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, CaptureEvent::Failed(ClientError::TransportFailure(_))))
            .count();
        assert!(failures >= 4);
    }
}
