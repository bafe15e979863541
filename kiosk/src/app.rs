use crate::settings::KioskConfig;
use crate::source::open_source;
use crate::viewfinder::Viewfinder;
use attendcore::capture::{CaptureFrame, Session, SkipReason, TickDecision, Ticket};
use attendcore::gateway_client::GatewayClient;
use attendcore::prelude::SubmissionRequest;
use attendcore::protocol::{AttendanceRecord, RecordType, VerificationVerdict};
use attendcore::render::history::{LOADING_MESSAGE, NO_RECORDS_MESSAGE};
use attendcore::render::{HistoryView, HistoryViewer, ResultDisplay, Tone};
use attendcore::telemetry::MetricsRecorder;
use attendcore::{CaptureMode, ClientResult, FrameSource};
use iced::widget::{
    button, canvas::Canvas, column, image, row, scrollable, stack, text, text_input, Column,
    Container,
};
use iced::{time, Alignment, Color, ContentFit, Element, Length, Subscription, Task, Theme};
use log::{debug, info, warn};
use std::time::Instant;

const VERIFYING_MESSAGE: &str = "Verifying...";
const STOPPED_MESSAGE: &str = "Camera stopped.";
const PREVIEW_WIDTH: f32 = 640.0;
const PREVIEW_HEIGHT: f32 = 480.0;
const MODES: [CaptureMode; 3] = [CaptureMode::CheckIn, CaptureMode::CheckOut, CaptureMode::Online];

pub fn run(config: KioskConfig, client: GatewayClient) -> iced::Result {
    iced::application(
        move || Kiosk::boot(config.clone(), client.clone()),
        Kiosk::update,
        Kiosk::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
}

fn application_title(state: &Kiosk) -> String {
    format!("Attendance Kiosk: {}", state.mode.title())
}

fn application_subscription(state: &Kiosk) -> Subscription<Message> {
    if state.session.is_none() {
        return Subscription::none();
    }
    let capture = time::every(state.config.timing_for(state.mode).period).map(|_| Message::Tick);
    match state.config.preview_interval() {
        Some(interval) => Subscription::batch([
            capture,
            time::every(interval).map(|_| Message::RefreshPreview),
        ]),
        None => capture,
    }
}

fn application_theme(_: &Kiosk) -> Theme {
    Theme::Dark
}

struct Kiosk {
    config: KioskConfig,
    client: GatewayClient,
    mode: CaptureMode,
    identity_input: String,
    /// Bumped on every start so completions from an earlier run are dropped.
    run: u64,
    session: Option<Session>,
    source: Option<Box<dyn FrameSource>>,
    display: ResultDisplay,
    preview: Option<Preview>,
    history: HistoryViewer,
    history_input: String,
    history_notice: Option<String>,
    metrics: MetricsRecorder,
}

/// Last submitted snapshot, kept for the viewfinder.
struct Preview {
    handle: image::Handle,
    width: u32,
    height: u32,
}

impl Preview {
    fn from_frame(frame: &CaptureFrame) -> Self {
        Self {
            handle: image::Handle::from_rgba(frame.width(), frame.height(), frame.to_rgba()),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    ModeSelected(CaptureMode),
    IdentityChanged(String),
    StartCamera,
    StopCamera,
    Tick,
    RefreshPreview,
    Submitted(u64, Ticket, ClientResult<VerificationVerdict>),
    Settled(u64, Ticket),
    DisplayExpired,
    HistoryInputChanged(String),
    SearchHistory,
    HistoryFetched(u64, ClientResult<Vec<AttendanceRecord>>),
}

impl Kiosk {
    fn boot(config: KioskConfig, client: GatewayClient) -> (Self, Task<Message>) {
        let mode = config.mode;
        let display = ResultDisplay::with_window(mode, config.display_window());
        (
            Kiosk {
                identity_input: config.reg_no.clone().unwrap_or_default(),
                config,
                client,
                mode,
                run: 0,
                session: None,
                source: None,
                display,
                preview: None,
                history: HistoryViewer::new(),
                history_input: String::new(),
                history_notice: None,
                metrics: MetricsRecorder::new(),
            },
            Task::none(),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::ModeSelected(mode) => {
                if state.session.is_none() {
                    state.mode = mode;
                    state.display = ResultDisplay::with_window(mode, state.config.display_window());
                    state.preview = None;
                }
                Task::none()
            }
            Message::IdentityChanged(value) => {
                state.identity_input = value;
                Task::none()
            }
            Message::StartCamera => state.start_camera(),
            Message::StopCamera => {
                state.stop_camera();
                Task::none()
            }
            Message::Tick => state.tick(),
            Message::RefreshPreview => {
                state.refresh_preview();
                Task::none()
            }
            Message::Submitted(run, ticket, result) => state.finish(run, ticket, result),
            Message::Settled(run, ticket) => {
                if run == state.run {
                    if let Some(session) = state.session.as_mut() {
                        session.settle(ticket);
                    }
                }
                Task::none()
            }
            Message::DisplayExpired => {
                state.display.expire(Instant::now());
                Task::none()
            }
            Message::HistoryInputChanged(value) => {
                state.history_input = value;
                Task::none()
            }
            Message::SearchHistory => match state.history.begin(&state.history_input) {
                Ok((generation, key)) => {
                    state.history_notice = None;
                    let client = state.client.clone();
                    Task::perform(async move { client.history(&key).await }, move |result| {
                        Message::HistoryFetched(generation, result)
                    })
                }
                Err(err) => {
                    state.history_notice = Some(err.status_text());
                    Task::none()
                }
            },
            Message::HistoryFetched(generation, result) => {
                if let Err(err) = &result {
                    warn!("history lookup failed: {}", err);
                }
                state.history.finish(generation, result);
                Task::none()
            }
        }
    }

    fn start_camera(&mut self) -> Task<Message> {
        if self.session.is_some() {
            return Task::none();
        }
        let mut session = match Session::new(self.mode, Some(self.identity_input.clone())) {
            Ok(session) => session,
            Err(err) => {
                self.display.show_error(&err);
                return Task::none();
            }
        };
        let mut source = match open_source(&self.config) {
            Ok(source) => source,
            Err(err) => {
                warn!("no frame source: {:#}", err);
                self.display.show_message(format!("Error: {err}"), Tone::Failure);
                return Task::none();
            }
        };
        if let Err(err) = source.open() {
            warn!("camera unavailable: {}", err);
            self.display.show_error(&err);
            return Task::none();
        }

        session.start();
        self.run += 1;
        self.display = ResultDisplay::with_window(self.mode, self.config.display_window());
        info!("camera started in {} mode", self.mode);
        let fire_now = self.mode.fires_immediately();
        self.session = Some(session);
        self.source = Some(source);
        if fire_now {
            Task::done(Message::Tick)
        } else {
            Task::none()
        }
    }

    fn stop_camera(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.display.reset();
        self.display.show_message(STOPPED_MESSAGE, Tone::Neutral);
        info!("camera stopped: {}", self.metrics.snapshot());
    }

    fn tick(&mut self) -> Task<Message> {
        let (Some(session), Some(source)) = (self.session.as_mut(), self.source.as_mut()) else {
            return Task::none();
        };
        let decision = match session.try_begin(|| source.grab()) {
            Ok(decision) => decision,
            Err(err) => {
                self.metrics.record_failure();
                warn!("frame grab failed: {}", err);
                self.display.show_error(&err);
                return Task::none();
            }
        };
        match decision {
            TickDecision::Capture(ticket, frame) => self.submit(ticket, frame),
            TickDecision::Skip(SkipReason::Busy) => {
                self.metrics.record_skipped_busy();
                Task::none()
            }
            TickDecision::Skip(SkipReason::NoFrame) => {
                self.metrics.record_skipped_no_frame();
                Task::none()
            }
            TickDecision::Skip(SkipReason::Idle) => Task::none(),
        }
    }

    /// Live viewfinder frame; never submitted and never touches the session.
    fn refresh_preview(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        match source.grab() {
            Ok(Some(image)) => self.preview = Some(Preview::from_frame(&CaptureFrame::new(image))),
            Ok(None) => {}
            Err(err) => debug!("preview frame unavailable: {}", err),
        }
    }

    fn submit(&mut self, ticket: Ticket, frame: CaptureFrame) -> Task<Message> {
        let Some(session) = self.session.as_ref() else {
            return Task::none();
        };
        let target = session.submission_target();
        let run = self.run;
        self.preview = Some(Preview::from_frame(&frame));

        let encoded = match frame.encode(self.config.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(err) => return Task::done(Message::Submitted(run, ticket, Err(err))),
        };
        if self.mode == CaptureMode::Online {
            self.display.show_pending(VERIFYING_MESSAGE);
        }
        self.metrics.record_submitted();

        let client = self.client.clone();
        let request = SubmissionRequest {
            target,
            frame: encoded,
        };
        Task::perform(async move { client.submit(request).await }, move |result| {
            Message::Submitted(run, ticket, result)
        })
    }

    fn finish(
        &mut self,
        run: u64,
        ticket: Ticket,
        result: ClientResult<VerificationVerdict>,
    ) -> Task<Message> {
        if run != self.run {
            return Task::none();
        }
        let Some(session) = self.session.as_mut() else {
            return Task::none();
        };
        if !session.complete(ticket, result.as_ref().ok().cloned()) {
            return Task::none();
        }

        let timing = self.config.timing_for(self.mode);
        let settle = Task::perform(tokio::time::sleep(timing.settle), move |_| {
            Message::Settled(run, ticket)
        });
        let shown = match result {
            Ok(verdict) => {
                self.metrics.record_verdict();
                info!(
                    "verdict success={} message={:?}",
                    verdict.success, verdict.message
                );
                self.display.show_verdict(&verdict, Instant::now());
                Task::perform(tokio::time::sleep(self.display.window()), |_| {
                    Message::DisplayExpired
                })
            }
            Err(err) => {
                self.metrics.record_failure();
                warn!("submission failed: {}", err);
                self.display.show_error(&err);
                Task::none()
            }
        };
        Task::batch([settle, shown])
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let active = state.session.is_some();

        let modes = MODES.iter().fold(row![].spacing(8), |buttons, mode| {
            let label = if *mode == state.mode {
                format!("[{}]", mode.title())
            } else {
                mode.title().to_string()
            };
            buttons.push(
                button(text(label))
                    .on_press_maybe((!active).then_some(Message::ModeSelected(*mode)))
                    .padding(8),
            )
        });

        let mut controls = Column::new().spacing(10).push(modes);
        if state.mode.requires_identity() {
            controls = controls.push(
                text_input("Registration Number", &state.identity_input)
                    .on_input(Message::IdentityChanged)
                    .on_submit(Message::StartCamera)
                    .padding(6),
            );
        }
        controls = controls.push(
            row![
                button("Start Camera")
                    .on_press_maybe((!active).then_some(Message::StartCamera))
                    .padding(10),
                button("Stop Camera")
                    .on_press_maybe(active.then_some(Message::StopCamera))
                    .padding(10),
            ]
            .spacing(10),
        );

        let status = state.display.status();
        let viewfinder = Canvas::new(Viewfinder::new(
            state.display.overlay().cloned(),
            state.preview.as_ref().map(|preview| (preview.width, preview.height)),
        ))
        .width(Length::Fixed(PREVIEW_WIDTH))
        .height(Length::Fixed(PREVIEW_HEIGHT));
        let surface: Element<'_, Message> = match &state.preview {
            Some(preview) => stack![
                image(preview.handle.clone())
                    .width(Length::Fixed(PREVIEW_WIDTH))
                    .height(Length::Fixed(PREVIEW_HEIGHT))
                    .content_fit(ContentFit::Fill),
                viewfinder,
            ]
            .into(),
            None => viewfinder.into(),
        };

        let capture_column = column![
            text(state.mode.title()).size(26),
            controls,
            surface,
            text(status.text.as_str()).size(18).color(tone_color(status.tone)),
            text(state.metrics.snapshot().to_string()).size(12),
        ]
        .spacing(12)
        .padding(16)
        .width(Length::Fixed(PREVIEW_WIDTH + 32.0));

        let mut lookup = column![
            text("Attendance History").size(26),
            row![
                text_input("Registration Number", &state.history_input)
                    .on_input(Message::HistoryInputChanged)
                    .on_submit(Message::SearchHistory)
                    .padding(6),
                button("Search").on_press(Message::SearchHistory).padding(8),
            ]
            .spacing(8),
        ]
        .spacing(10);
        if let Some(notice) = &state.history_notice {
            lookup = lookup.push(text(notice.as_str()).size(14).color(FAILURE_COLOR));
        }
        let history_column = lookup
            .push(scrollable(history_body(state.history.view())).height(Length::Fill))
            .padding(16)
            .width(Length::Fill);

        let layout = row![capture_column, history_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

const FAILURE_COLOR: Color = Color {
    r: 0.95,
    g: 0.35,
    b: 0.35,
    a: 1.0,
};

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Neutral => Color::from_rgb(0.85, 0.85, 0.85),
        Tone::Pending => Color::from_rgb(0.95, 0.75, 0.2),
        Tone::Success => Color::from_rgb(0.3, 0.85, 0.4),
        Tone::Failure => FAILURE_COLOR,
    }
}

fn record_color(kind: RecordType) -> Color {
    match kind {
        RecordType::In => Color::from_rgb(0.3, 0.85, 0.4),
        RecordType::Out => Color::from_rgb(1.0, 0.65, 0.0),
        RecordType::Present => Color::from_rgb(0.35, 0.6, 1.0),
        RecordType::Unknown => Color::from_rgb(0.6, 0.6, 0.6),
    }
}

fn cell(content: &str) -> Element<'_, Message> {
    text(content).size(14).width(Length::Fixed(120.0)).into()
}

fn history_body(view: &HistoryView) -> Element<'_, Message> {
    match view {
        HistoryView::Blank => Column::new().into(),
        HistoryView::Loading => text(LOADING_MESSAGE).size(14).into(),
        HistoryView::Empty => text(NO_RECORDS_MESSAGE).size(14).into(),
        HistoryView::Failed(message) => text(message.as_str()).size(14).color(FAILURE_COLOR).into(),
        HistoryView::Table(table) => {
            let header = row![cell("Date"), cell("Time"), cell("Status"), cell("Mode")];
            table
                .rows
                .iter()
                .fold(
                    column![text(table.heading.as_str()).size(18), header].spacing(4),
                    |col, record| {
                        col.push(row![
                            cell(&record.date),
                            cell(&record.time),
                            text(record.status.as_str())
                                .size(14)
                                .width(Length::Fixed(120.0))
                                .color(record_color(record.kind)),
                            cell(&record.mode),
                        ])
                    },
                )
                .into()
        }
    }
}
