use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use smithay_client_toolkit as sctk;
use sctk::compositor::{CompositorHandler, CompositorState, Region};
use sctk::output::{OutputHandler, OutputState};
use sctk::reexports::calloop::{self, EventLoop};
use sctk::reexports::calloop_wayland_source::WaylandSource;
use sctk::registry::{ProvidesRegistryState, RegistryState};
use sctk::registry_handlers;
use sctk::seat::pointer::cursor_shape::CursorShapeManager;
use sctk::seat::pointer::{PointerEvent, PointerEventKind, PointerHandler};
use sctk::seat::{Capability, SeatHandler, SeatState};
use sctk::reexports::protocols::wp::cursor_shape::v1::client::wp_cursor_shape_device_v1::Shape;
use sctk::shell::wlr_layer::{
    Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
    LayerSurfaceConfigure,
};
use sctk::shell::WaylandSurface;
use sctk::shm::slot::SlotPool;
use sctk::shm::{Shm, ShmHandler};
use sctk::{
    delegate_compositor, delegate_layer, delegate_output, delegate_pointer,
    delegate_registry, delegate_seat, delegate_shm,
};
use tiny_skia::Pixmap;
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::{wl_output, wl_pointer, wl_seat, wl_shm, wl_surface};
use wayland_client::{Connection, QueueHandle};

use crate::bar::{Backend, Bar, BarEvent, Frame};
use crate::clock::{self, TimeOfDay};
use crate::colors::Colors;
use crate::config::{FontSpec, Settings};
use crate::render;
use crate::signal;
use crate::text::TextRenderer;
use crate::track::{Orientation, Rect};

const NAMESPACE: &str = "daybar";
const POPUP_NAMESPACE: &str = "daybar-popup";

// --- Display side of the bar ---

/// Layer surfaces, buffers and the lazily loaded font.
struct Surfaces {
    conn: Connection,
    qh: QueueHandle<App>,
    compositor: CompositorState,
    layer_shell: LayerShell,
    bar: LayerSurface,
    bar_size: (u32, u32),
    pool: SlotPool,
    colors: Colors,
    font: FontSpec,
    text: Option<TextRenderer>,
    // popup contents waiting for (or already drawn after) a configure
    popup_text: String,
    popup_size: (u32, u32),
    popup: PopupLifecycle,
}

/// Where the popup layer surface is in its configure/map cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PopupLifecycle {
    wanted: bool,
    configured: bool,
    mapped: bool,
}

impl PopupLifecycle {
    /// True if a buffer can go out now. Otherwise an initial commit is due
    /// and the configure will draw it.
    fn show(&mut self) -> bool {
        self.wanted = true;
        self.configured
    }

    /// True if a buffer is attached and must be dropped. Unmapping sends the
    /// surface back to waiting for a configure.
    fn hide(&mut self) -> bool {
        self.wanted = false;
        if !self.mapped {
            return false;
        }
        self.mapped = false;
        self.configured = false;
        true
    }

    /// True if the configure should be answered with a buffer.
    fn configure(&mut self) -> bool {
        self.configured = true;
        self.wanted
    }

    fn rendered(&mut self) {
        self.mapped = true;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Surfaces {
    fn text(&mut self) -> Result<&mut TextRenderer> {
        if self.text.is_none() {
            self.text = Some(TextRenderer::load(&self.font).context("failed to load popup font")?);
        }
        self.text.as_mut().ok_or_else(|| anyhow!("popup font unavailable"))
    }

    fn is_bar(&self, surface: &wl_surface::WlSurface) -> bool {
        self.bar.wl_surface() == surface
    }

    fn resize_bar(&mut self, orientation: Orientation, thickness: u32, reserve_space: bool) {
        let (w, h) = if orientation.is_horizontal() { (0, thickness) } else { (thickness, 0) };
        self.bar.set_size(w, h);
        let zone = if reserve_space { i32::try_from(thickness).unwrap_or(i32::MAX) } else { -1 };
        self.bar.set_exclusive_zone(zone);
        self.bar.commit();
    }

    fn render_popup(&mut self, popup: &LayerSurface) -> Result<()> {
        let (w, h) = self.popup_size;
        if w == 0 || h == 0 {
            return Ok(());
        }
        let mut pixmap = Pixmap::new(w, h).context("popup size out of range")?;
        render::fill(&mut pixmap, self.colors.popup_background);
        render::stroke_border(&mut pixmap, self.colors.popup_border);

        let (text, color) = (self.popup_text.clone(), self.colors.popup_text);
        let (tw, th) = self.text()?.measure(&text);
        let x = (w.saturating_sub(tw) / 2) as f32;
        let y = (h.saturating_sub(th) / 2) as f32;
        self.text()?.render(&mut pixmap, &text, x, y, color);

        self.present(popup.wl_surface(), &pixmap)?;
        self.popup.rendered();
        Ok(())
    }

    fn present(&mut self, surface: &wl_surface::WlSurface, pixmap: &Pixmap) -> Result<()> {
        let (w, h) = (pixmap.width(), pixmap.height());
        let (wl_buf, canvas) = self
            .pool
            .create_buffer(w as i32, h as i32, w as i32 * 4, wl_shm::Format::Argb8888)
            .context("failed to allocate shm buffer")?;
        render::copy_to_argb(canvas, pixmap);
        wl_buf.attach_to(surface).context("failed to attach buffer")?;
        surface.damage_buffer(0, 0, w as i32, h as i32);
        surface.commit();
        self.conn.flush().context("failed to flush the display connection")?;
        Ok(())
    }
}

impl Backend for Surfaces {
    type Popup = LayerSurface;

    fn paint_bar(&mut self, frame: &Frame) -> Result<()> {
        let (w, h) = self.bar_size;
        let mut pixmap = Pixmap::new(w, h).context("bar size out of range")?;
        render::paint_frame(&mut pixmap, frame, &self.colors);
        let surface = self.bar.wl_surface().clone();
        self.present(&surface, &pixmap)
    }

    fn text_extent(&mut self, text: &str) -> Result<(u32, u32)> {
        Ok(self.text()?.measure(text))
    }

    fn create_popup(&mut self, area: Rect) -> Result<LayerSurface> {
        let surface = self.compositor.create_surface(&self.qh);
        // click-through, so hovering never leaves the bar
        let region = Region::new(&self.compositor).context("failed to create input region")?;
        surface.set_input_region(Some(region.wl_region()));
        let popup = self.layer_shell.create_layer_surface(
            &self.qh, surface, Layer::Overlay, Some(POPUP_NAMESPACE), None,
        );
        popup.set_anchor(Anchor::TOP | Anchor::LEFT);
        popup.set_exclusive_zone(-1);
        popup.set_keyboard_interactivity(KeyboardInteractivity::None);
        self.move_resize_popup(&popup, area);
        Ok(popup)
    }

    fn move_resize_popup(&mut self, popup: &LayerSurface, area: Rect) {
        popup.set_margin(area.y, 0, 0, area.x);
        popup.set_size(area.w, area.h);
        self.popup_size = (area.w, area.h);
    }

    fn show_popup(&mut self, popup: &LayerSurface, text: &str) -> Result<()> {
        self.popup_text = text.to_string();
        if self.popup.show() {
            return self.render_popup(popup);
        }
        // initial commit without a buffer; the configure maps it
        popup.commit();
        self.conn.flush().context("failed to flush the display connection")?;
        Ok(())
    }

    fn hide_popup(&mut self, popup: &LayerSurface) {
        if self.popup.hide() {
            popup.wl_surface().attach(None, 0, 0);
            popup.commit();
        }
    }

    fn destroy_popup(&mut self, popup: LayerSurface) {
        self.popup.reset();
        drop(popup);
    }
}

// --- App ---

struct App {
    registry_state: RegistryState,
    seat_state: SeatState,
    output_state: OutputState,
    shm: Shm,
    pointer: Option<wl_pointer::WlPointer>,
    cursor_shape_manager: Option<CursorShapeManager>,
    home: HomeOutput<wl_output::WlOutput>,
    reserve_space: bool,
    exit: bool,
    failure: Option<anyhow::Error>,
    bar: Bar<LayerSurface>,
    surfaces: Surfaces,
}

/// The output the bar sits on. Once the bar has entered one, sizes reported
/// for other outputs are ignored.
#[derive(Debug)]
struct HomeOutput<T> {
    entered: Option<T>,
}

impl<T> Default for HomeOutput<T> {
    fn default() -> Self {
        Self { entered: None }
    }
}

impl<T: PartialEq + Clone> HomeOutput<T> {
    fn enter(&mut self, output: &T) {
        self.entered = Some(output.clone());
    }

    fn accepts(&self, output: &T) -> bool {
        self.entered.as_ref().is_none_or(|home| home == output)
    }

    fn remove(&mut self, output: &T) {
        if self.entered.as_ref() == Some(output) {
            self.entered = None;
        }
    }
}

impl App {
    fn fail(&mut self, err: anyhow::Error) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.exit = true;
    }

    fn handle(&mut self, event: BarEvent) {
        if let Err(e) = self.bar.handle(event, &mut self.surfaces) {
            self.fail(e);
        }
    }

    fn output_changed(&mut self, output: &wl_output::WlOutput) {
        if !self.home.accepts(output) {
            return;
        }
        let Some(info) = self.output_state.info(output) else { return };
        let size = info
            .logical_size
            .or_else(|| info.modes.iter().find(|m| m.current).map(|m| m.dimensions));
        let Some((w, h)) = size else { return };
        if w <= 0 || h <= 0 {
            return;
        }
        debug!("output {:?} is {w}x{h}", info.name);
        if let Some(thickness) = self.bar.set_screen(w as u32, h as u32) {
            self.surfaces.resize_bar(self.bar.orientation(), thickness, self.reserve_space);
        }
    }

    fn tick(&mut self) -> Result<()> {
        let now = clock::now().context("failed to read the system clock")?;
        self.bar.tick(&mut self.surfaces, TimeOfDay::from(&now))?;
        Ok(())
    }

    /// Popup first, then the font. The connection goes when the app and the
    /// event loop are dropped.
    fn shutdown(&mut self) {
        debug!("shutting down with popup {:?}", self.bar.popup_state());
        self.bar.shutdown(&mut self.surfaces);
        self.surfaces.text = None;
        if let Err(e) = self.surfaces.conn.flush() {
            warn!("failed to flush the display connection on shutdown: {e}");
        }
    }
}

// --- Wayland handler boilerplate ---

impl CompositorHandler for App {
    fn scale_factor_changed(&mut self, _: &Connection, _: &QueueHandle<Self>, surface: &wl_surface::WlSurface, _: i32) {
        if self.surfaces.is_bar(surface) {
            self.handle(BarEvent::Exposed);
        }
    }
    fn transform_changed(&mut self, _: &Connection, _: &QueueHandle<Self>, surface: &wl_surface::WlSurface, _: wl_output::Transform) {
        if self.surfaces.is_bar(surface) {
            self.handle(BarEvent::Exposed);
        }
    }
    fn frame(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &wl_surface::WlSurface, _: u32) {}
    fn surface_enter(&mut self, _: &Connection, _: &QueueHandle<Self>, surface: &wl_surface::WlSurface, output: &wl_output::WlOutput) {
        if self.surfaces.is_bar(surface) {
            self.home.enter(output);
            self.output_changed(output);
        }
    }
    fn surface_leave(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &wl_surface::WlSurface, _: &wl_output::WlOutput) {}
}

impl OutputHandler for App {
    fn output_state(&mut self) -> &mut OutputState { &mut self.output_state }
    fn new_output(&mut self, _: &Connection, _: &QueueHandle<Self>, output: wl_output::WlOutput) {
        self.output_changed(&output);
    }
    fn update_output(&mut self, _: &Connection, _: &QueueHandle<Self>, output: wl_output::WlOutput) {
        self.output_changed(&output);
    }
    fn output_destroyed(&mut self, _: &Connection, _: &QueueHandle<Self>, output: wl_output::WlOutput) {
        self.home.remove(&output);
    }
}

impl SeatHandler for App {
    fn seat_state(&mut self) -> &mut SeatState { &mut self.seat_state }
    fn new_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}
    fn new_capability(&mut self, _: &Connection, qh: &QueueHandle<Self>, seat: wl_seat::WlSeat, capability: Capability) {
        if capability == Capability::Pointer && self.pointer.is_none() {
            match self.seat_state.get_pointer(qh, &seat) {
                Ok(pointer) => self.pointer = Some(pointer),
                Err(e) => self.fail(anyhow!("failed to get pointer: {e}")),
            }
        }
    }
    fn remove_capability(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat, capability: Capability) {
        if capability == Capability::Pointer {
            if let Some(pointer) = self.pointer.take() {
                pointer.release();
            }
        }
    }
    fn remove_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}
}

impl PointerHandler for App {
    fn pointer_frame(&mut self, _: &Connection, qh: &QueueHandle<Self>, pointer: &wl_pointer::WlPointer, events: &[PointerEvent]) {
        for event in events {
            if !self.surfaces.is_bar(&event.surface) {
                continue;
            }
            match event.kind {
                PointerEventKind::Enter { serial } => {
                    if let Some(manager) = &self.cursor_shape_manager {
                        let device = manager.get_shape_device(pointer, qh);
                        device.set_shape(serial, Shape::Default);
                        device.destroy();
                    }
                    match clock::now() {
                        Ok(at) => self.handle(BarEvent::PointerEnter { at }),
                        Err(e) => self.fail(anyhow::Error::new(e).context("failed to read the system clock")),
                    }
                }
                PointerEventKind::Leave { .. } => self.handle(BarEvent::PointerLeave),
                _ => {}
            }
        }
    }
}

impl ShmHandler for App {
    fn shm_state(&mut self) -> &mut Shm { &mut self.shm }
}

impl LayerShellHandler for App {
    fn closed(&mut self, _: &Connection, _: &QueueHandle<Self>, layer: &LayerSurface) {
        if self.surfaces.is_bar(layer.wl_surface()) {
            info!("bar surface closed by the compositor");
            self.exit = true;
        } else if self.bar.popup().is_some_and(|p| p.wl_surface() == layer.wl_surface()) {
            debug!("popup closed by the compositor");
            self.surfaces.popup.reset();
            self.bar.forget_popup();
        }
    }
    fn configure(&mut self, _: &Connection, _: &QueueHandle<Self>, layer: &LayerSurface, configure: LayerSurfaceConfigure, _: u32) {
        if self.surfaces.is_bar(layer.wl_surface()) {
            let (w, h) = configure.new_size;
            if w > 0 { self.surfaces.bar_size.0 = w; }
            if h > 0 { self.surfaces.bar_size.1 = h; }
            let (w, h) = self.surfaces.bar_size;
            self.bar.configure(w, h);
            debug!("bar configured at {w}x{h}, {}px per hour", self.bar.hour_tick());
            return;
        }
        if configure.new_size.0 > 0 && configure.new_size.1 > 0 {
            self.surfaces.popup_size = configure.new_size;
        }
        // the pointer may have left before the compositor answered
        if !self.surfaces.popup.configure() {
            return;
        }
        if let Err(e) = self.surfaces.render_popup(layer) {
            self.fail(e);
        }
    }
}

impl ProvidesRegistryState for App {
    fn registry(&mut self) -> &mut RegistryState { &mut self.registry_state }
    registry_handlers![OutputState, SeatState];
}

delegate_compositor!(App);
delegate_output!(App);
delegate_seat!(App);
delegate_pointer!(App);
delegate_shm!(App);
delegate_layer!(App);
delegate_registry!(App);

// --- Main loop ---

fn connect(display: Option<&str>) -> Result<Connection> {
    let Some(name) = display else {
        return Connection::connect_to_env().context("unable to connect to the Wayland display");
    };
    let path = if Path::new(name).is_absolute() {
        PathBuf::from(name)
    } else {
        let runtime = std::env::var_os("XDG_RUNTIME_DIR")
            .context("XDG_RUNTIME_DIR is not set, cannot locate display")?;
        PathBuf::from(runtime).join(name)
    };
    let stream = UnixStream::connect(&path)
        .with_context(|| format!("unable to open display {}", path.display()))?;
    Connection::from_socket(stream).with_context(|| format!("unable to open display {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Tick,
    Exit,
}

/// What to do after one wait. An interrupted wait counts as an early
/// wakeup. Termination wins over a parked failure; a closed bar exits.
fn next_step(
    waited: Result<(), calloop::Error>,
    terminated: bool,
    exit: bool,
    failure: Option<anyhow::Error>,
) -> Result<Step> {
    match waited {
        Ok(()) => {}
        Err(calloop::Error::IoError(e)) if e.kind() == std::io::ErrorKind::Interrupted => {}
        Err(e) => return Err(e).context("event loop wait failed"),
    }
    if terminated {
        info!("termination requested, shutting down");
        return Ok(Step::Exit);
    }
    if let Some(e) = failure {
        return Err(e);
    }
    Ok(if exit { Step::Exit } else { Step::Tick })
}

fn anchor(orientation: Orientation) -> Anchor {
    match orientation {
        Orientation::Top => Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
        Orientation::Bottom => Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
        Orientation::Left => Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM,
        Orientation::Right => Anchor::RIGHT | Anchor::TOP | Anchor::BOTTOM,
    }
}

pub fn run(settings: Settings) -> Result<()> {
    let conn = connect(settings.display.as_deref())?;
    let (globals, event_queue) = registry_queue_init::<App>(&conn)
        .context("failed to initialize Wayland registry")?;
    let qh = event_queue.handle();

    let mut event_loop: EventLoop<App> = EventLoop::try_new().context("failed to create event loop")?;
    let loop_handle = event_loop.handle();
    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle)
        .map_err(|e| anyhow!("failed to insert Wayland source: {}", e.error))?;
    signal::install(&event_loop.handle())?;

    let compositor = CompositorState::bind(&globals, &qh).context("wl_compositor not available")?;
    let layer_shell = LayerShell::bind(&globals, &qh)
        .context("wlr-layer-shell not available; the compositor must support wlr_layer_shell_v1")?;
    let shm = Shm::bind(&globals, &qh).context("wl_shm not available")?;
    let cursor_shape_manager = CursorShapeManager::bind(&globals, &qh).ok();

    let orientation = settings.orientation;
    let surface = compositor.create_surface(&qh);
    let layer = layer_shell.create_layer_surface(&qh, surface, Layer::Overlay, Some(NAMESPACE), None);
    layer.set_anchor(anchor(orientation));
    layer.set_keyboard_interactivity(KeyboardInteractivity::None);

    let pool = SlotPool::new(256 * 1024, &shm).context("failed to create shm pool")?;

    let mut surfaces = Surfaces {
        conn: conn.clone(),
        qh: qh.clone(),
        compositor,
        layer_shell,
        bar: layer,
        bar_size: (settings.thickness, settings.thickness),
        pool,
        colors: settings.colors,
        font: settings.font.clone(),
        text: None,
        popup_text: String::new(),
        popup_size: (0, 0),
        popup: PopupLifecycle::default(),
    };
    surfaces.resize_bar(orientation, settings.thickness, settings.reserve_space);

    let mut app = App {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        shm,
        pointer: None,
        cursor_shape_manager,
        home: HomeOutput::default(),
        reserve_space: settings.reserve_space,
        exit: false,
        failure: None,
        bar: Bar::new(&settings),
        surfaces,
    };
    info!(
        "daybar on the {} edge, {}px thick, redraw check every {:?}",
        orientation.name(),
        app.bar.thickness(),
        settings.tick
    );

    loop {
        let waited = event_loop.dispatch(Some(settings.tick), &mut app);
        match next_step(waited, signal::terminated(), app.exit, app.failure.take())? {
            Step::Tick => app.tick()?,
            Step::Exit => break,
        }
    }

    app.shutdown();
    drop(app);
    drop(event_loop);
    Ok(())
}
