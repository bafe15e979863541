use crate::settings::KioskConfig;
use crate::source::open_source;
use anyhow::Context;
use attendcore::capture::{CaptureEvent, CaptureLoop, Session};
use attendcore::gateway_client::GatewayClient;
use attendcore::render::{ResultDisplay, Tone};
use attendcore::ClientError;
use log::{info, warn};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Runs the capture loop without a window, logging each status line, until
/// Ctrl+C.
pub fn run(config: KioskConfig, client: GatewayClient) -> anyhow::Result<()> {
    let session = Session::new(config.mode, config.reg_no.clone())
        .context("online mode needs --reg-no")?;
    let source = open_source(&config)?;
    let capture = CaptureLoop::new(session, source, Arc::new(client))
        .with_timing(config.timing_for(config.mode))
        .with_jpeg_quality(config.jpeg_quality);
    let display = ResultDisplay::with_window(config.mode, config.display_window());

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating kiosk runtime")?;

    let device_error = runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => stop.cancel(),
                Err(err) => warn!("could not listen for Ctrl+C: {}", err),
            }
        });

        let (events, receiver) = mpsc::unbounded_channel();
        let (_, device_error) =
            tokio::join!(capture.run(cancel, events), report(receiver, display, log_line));
        device_error
    });

    match device_error {
        Some(err) => Err(err).context("camera unavailable"),
        None => Ok(()),
    }
}

fn log_line(tone: Tone, line: &str) {
    match tone {
        Tone::Failure => warn!("{}", line),
        _ => info!("{}", line),
    }
}

/// Mirrors what the window would show, one line per status change.
///
/// Runs on tokio's clock so the display window elapses even when no further
/// event arrives.
async fn report(
    mut events: UnboundedReceiver<CaptureEvent>,
    mut display: ResultDisplay,
    mut emit: impl FnMut(Tone, &str),
) -> Option<ClientError> {
    let mut device_error = None;
    loop {
        let deadline = display.expires_at();
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = sleep_until(deadline.map(Instant::from_std).unwrap_or_else(Instant::now)),
                if deadline.is_some() =>
            {
                if display.expire(Instant::now().into_std()) {
                    emit(display.status().tone, &display.status().text);
                }
                continue;
            }
        };

        match event {
            CaptureEvent::Started => emit(display.status().tone, &display.status().text),
            CaptureEvent::DeviceError(err) => {
                display.show_error(&err);
                emit(Tone::Failure, &display.status().text);
                device_error = Some(err);
            }
            CaptureEvent::Submitting { target, bytes } => {
                emit(
                    Tone::Pending,
                    &format!("submitting {} bytes to {}", bytes, target.route()),
                );
            }
            CaptureEvent::Verdict(verdict) => {
                display.show_verdict(&verdict, Instant::now().into_std());
                let status = display.status();
                let line = match display.overlay() {
                    Some(overlay) => format!(
                        "{} [{} at ({:.0}, {:.0})-({:.0}, {:.0})]",
                        status.text,
                        overlay.label,
                        overlay.face.x1,
                        overlay.face.y1,
                        overlay.face.x2,
                        overlay.face.y2
                    ),
                    None => status.text.clone(),
                };
                emit(status.tone, &line);
            }
            CaptureEvent::Failed(err) => {
                display.show_error(&err);
                emit(Tone::Failure, &display.status().text);
            }
            CaptureEvent::Stopped(snapshot) => {
                emit(Tone::Neutral, &format!("capture stopped: {}", snapshot))
            }
        }
    }
    device_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendcore::protocol::VerificationVerdict;
    use attendcore::CaptureMode;
    use std::time::Duration;
    use tokio::time::sleep;

    fn verdict(success: bool, message: &str) -> CaptureEvent {
        CaptureEvent::Verdict(VerificationVerdict {
            success,
            message: message.into(),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn idle_message_is_reported_when_window_elapses() {
        let start = Instant::now();
        let display = ResultDisplay::with_window(CaptureMode::CheckIn, Duration::from_secs(3));
        let (events, receiver) = mpsc::unbounded_channel();
        let mut lines = Vec::new();

        let feed = async move {
            events.send(verdict(true, "Checked in")).unwrap();
            sleep(Duration::from_secs(5)).await;
        };
        let (device_error, ()) = tokio::join!(
            report(receiver, display, |tone, line: &str| {
                lines.push((start.elapsed(), tone, line.to_string()))
            }),
            feed
        );

        assert!(device_error.is_none());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].2, "Checked in");
        assert_eq!(lines[0].1, Tone::Success);
        assert_eq!(lines[1].2, CaptureMode::CheckIn.idle_message());
        assert!(lines[1].0 >= Duration::from_secs(3));
        assert!(lines[1].0 < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn newer_verdict_pushes_the_reset_out() {
        let start = Instant::now();
        let display = ResultDisplay::with_window(CaptureMode::CheckOut, Duration::from_secs(3));
        let (events, receiver) = mpsc::unbounded_channel();
        let mut lines = Vec::new();

        let feed = async move {
            events.send(verdict(true, "Checked out")).unwrap();
            sleep(Duration::from_secs(1)).await;
            events.send(verdict(false, "Face not recognized")).unwrap();
            sleep(Duration::from_secs(6)).await;
        };
        tokio::join!(
            report(receiver, display, |_, line: &str| {
                lines.push((start.elapsed(), line.to_string()))
            }),
            feed
        );

        let idle: Vec<_> = lines
            .iter()
            .filter(|(_, line)| line == CaptureMode::CheckOut.idle_message())
            .collect();
        assert_eq!(idle.len(), 1);
        assert!(idle[0].0 >= Duration::from_secs(4));
    }
}
