//! Redraw decisions and popup state for the bar.
//!
//! [`Bar`] owns everything that changes while the bar runs: the geometry the
//! compositor handed us, the cached hour ticks, the last drawn marker
//! position and the popup. The windowing side is reached only through
//! [`Backend`], so the whole state machine can be driven without a display.

use anyhow::Result;
use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::clock::{self, TimeOfDay};
use crate::config::Settings;
use crate::track::{
    self, Orientation, Rect, TrackGeometry, MARKER_BIAS, MARKER_WIDTH, TICK_WIDTH,
};

/// Everything painted on the bar for one marker position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub marker: Rect,
    pub hour_ticks: Vec<Rect>,
    pub highlights: Vec<Rect>,
}

/// Drawing and window operations the bar needs from the display side.
pub trait Backend {
    type Popup;

    /// Clear the bar, paint `frame` and flush.
    fn paint_bar(&mut self, frame: &Frame) -> Result<()>;
    /// Rendered width and line height of `text` in the popup font.
    fn text_extent(&mut self, text: &str) -> Result<(u32, u32)>;
    fn create_popup(&mut self, area: Rect) -> Result<Self::Popup>;
    fn move_resize_popup(&mut self, popup: &Self::Popup, area: Rect);
    /// Raise and map the popup, render `text` into it and flush.
    fn show_popup(&mut self, popup: &Self::Popup, text: &str) -> Result<()>;
    fn hide_popup(&mut self, popup: &Self::Popup);
    fn destroy_popup(&mut self, popup: Self::Popup);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Hidden,
    Shown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarEvent {
    PointerEnter { at: NaiveDateTime },
    PointerLeave,
    Exposed,
}

pub struct Bar<P> {
    orientation: Orientation,
    thickness: u32,
    screen: Option<(u32, u32)>,
    geometry: Option<TrackGeometry>,
    hourtick: u32,
    hour_ticks: [i32; 23],
    highlights: Vec<f32>,
    marker_bias: i32,
    popup_padding: u32,
    // None forces the next tick to draw
    lastpos: Option<i32>,
    popup: Option<P>,
    popup_state: PopupState,
}

impl<P> Bar<P> {
    pub fn new(settings: &Settings) -> Self {
        Self {
            orientation: settings.orientation,
            thickness: settings.thickness,
            screen: None,
            geometry: None,
            hourtick: 0,
            hour_ticks: [0; 23],
            highlights: settings.highlights.clone(),
            marker_bias: settings.marker_bias,
            popup_padding: settings.popup_padding,
            lastpos: None,
            popup: None,
            popup_state: PopupState::Hidden,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn thickness(&self) -> u32 {
        self.thickness
    }

    pub fn hour_tick(&self) -> u32 {
        self.hourtick
    }

    pub fn popup_state(&self) -> PopupState {
        self.popup_state
    }

    pub fn popup(&self) -> Option<&P> {
        self.popup.as_ref()
    }

    /// Records the output size. Returns the new thickness if it had to be
    /// clamped to fit.
    pub fn set_screen(&mut self, width: u32, height: u32) -> Option<u32> {
        self.screen = Some((width, height));
        let across = self.orientation.across_of(width, height);
        let clamped = track::clamp_thickness(self.thickness, across);
        if clamped == self.thickness {
            return None;
        }
        warn!(
            "daybar: {} is bigger than the display! Falling back to {} pixels.",
            self.thickness, clamped
        );
        self.thickness = clamped;
        Some(clamped)
    }

    /// New size from the compositor. Implies an exposure.
    pub fn configure(&mut self, width: u32, height: u32) {
        let geometry = TrackGeometry {
            length_px: self.orientation.length_of(width, height),
            thickness_px: self.orientation.across_of(width, height),
        };
        if self.geometry != Some(geometry) {
            self.hourtick = geometry.hour_tick();
            self.hour_ticks = track::compute_hour_tick_offsets(self.hourtick);
            debug!(
                "track is {}px long, {}px per hour",
                geometry.length_px, self.hourtick
            );
        }
        self.geometry = Some(geometry);
        self.lastpos = None;
    }

    pub fn handle<B: Backend<Popup = P>>(&mut self, event: BarEvent, backend: &mut B) -> Result<()> {
        match event {
            BarEvent::PointerEnter { at } => self.show_popup(backend, &at),
            BarEvent::PointerLeave => {
                self.hide_popup(backend);
                Ok(())
            }
            BarEvent::Exposed => {
                self.lastpos = None;
                Ok(())
            }
        }
    }

    /// Redraws if the marker moved (or an exposure forced it). Returns
    /// whether anything was painted.
    pub fn tick<B: Backend<Popup = P>>(&mut self, backend: &mut B, time: TimeOfDay) -> Result<bool> {
        let Some(geometry) = self.geometry else { return Ok(false) };
        let newpos = match self.marker_bias {
            MARKER_BIAS => track::compute_marker(time.hour, time.minute, self.hourtick),
            bias => track::compute_marker_with_bias(time.hour, time.minute, self.hourtick, bias),
        };
        if self.lastpos == Some(newpos) {
            return Ok(false);
        }
        let frame = self.frame(newpos, geometry.thickness_px);
        backend.paint_bar(&frame)?;
        debug!("marker moved to {newpos}");
        self.lastpos = Some(newpos);
        Ok(true)
    }

    pub fn frame(&self, newpos: i32, thickness: u32) -> Frame {
        let o = self.orientation;
        Frame {
            marker: o.segment(newpos, MARKER_WIDTH, thickness),
            hour_ticks: self
                .hour_ticks
                .iter()
                .map(|&off| o.segment(off, TICK_WIDTH, thickness))
                .collect(),
            highlights: self
                .highlights
                .iter()
                .map(|&h| o.segment(track::compute_highlight_offset(h, self.hourtick), TICK_WIDTH, thickness))
                .collect(),
        }
    }

    /// Box of `text` plus padding, clamped to and centred on the screen.
    pub fn popup_area(&self, text_w: u32, text_h: u32) -> Rect {
        let pad = self.popup_padding.saturating_mul(2);
        let mut w = text_w.saturating_add(pad);
        let mut h = text_h.saturating_add(pad);
        let Some((sw, sh)) = self.screen else {
            return Rect { x: 0, y: 0, w, h };
        };
        if w > sw { w = sw.saturating_sub(2); }
        if h > sh { h = sh.saturating_sub(2); }
        Rect {
            x: ((sw - w) / 2) as i32,
            y: ((sh - h) / 2) as i32,
            w,
            h,
        }
    }

    fn show_popup<B: Backend<Popup = P>>(&mut self, backend: &mut B, at: &NaiveDateTime) -> Result<()> {
        let text = clock::format_popup(at);
        let (tw, th) = backend.text_extent(&text)?;
        let area = self.popup_area(tw, th);
        let popup = match self.popup.take() {
            Some(popup) => {
                backend.move_resize_popup(&popup, area);
                popup
            }
            None => backend.create_popup(area)?,
        };
        let shown = backend.show_popup(&popup, &text);
        self.popup = Some(popup);
        shown?;
        self.popup_state = PopupState::Shown;
        debug!("popup shown: {text}");
        Ok(())
    }

    fn hide_popup<B: Backend<Popup = P>>(&mut self, backend: &mut B) {
        if let Some(popup) = &self.popup {
            backend.hide_popup(popup);
        }
        self.popup_state = PopupState::Hidden;
    }

    /// The compositor destroyed the popup behind our back; the next show
    /// creates a fresh one.
    pub fn forget_popup(&mut self) -> Option<P> {
        self.popup_state = PopupState::Hidden;
        self.popup.take()
    }

    /// Releases the popup, if one was ever created.
    pub fn shutdown<B: Backend<Popup = P>>(&mut self, backend: &mut B) {
        if let Some(popup) = self.popup.take() {
            backend.destroy_popup(popup);
        }
        self.popup_state = PopupState::Hidden;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Cli, Config};
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Frame>,
        created: Vec<Rect>,
        moved: Vec<(u32, Rect)>,
        shown: Vec<(u32, String)>,
        hidden: Vec<u32>,
        destroyed: Vec<u32>,
    }

    impl Backend for Recorder {
        type Popup = u32;

        fn paint_bar(&mut self, frame: &Frame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn text_extent(&mut self, text: &str) -> Result<(u32, u32)> {
            Ok((text.len() as u32 * 10, 20))
        }

        fn create_popup(&mut self, area: Rect) -> Result<u32> {
            self.created.push(area);
            Ok(self.created.len() as u32)
        }

        fn move_resize_popup(&mut self, popup: &u32, area: Rect) {
            self.moved.push((*popup, area));
        }

        fn show_popup(&mut self, popup: &u32, text: &str) -> Result<()> {
            self.shown.push((*popup, text.to_string()));
            Ok(())
        }

        fn hide_popup(&mut self, popup: &u32) {
            self.hidden.push(*popup);
        }

        fn destroy_popup(&mut self, popup: u32) {
            self.destroyed.push(popup);
        }
    }

    fn settings(orientation: Orientation) -> Settings {
        let mut s = resolve(Config::default(), Cli::default()).unwrap();
        s.orientation = orientation;
        s
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn tod(hour: u32, minute: u32) -> TimeOfDay {
        TimeOfDay { hour, minute }
    }

    #[test]
    fn test_nothing_drawn_before_configure() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        assert!(!bar.tick(&mut rec, tod(12, 0)).unwrap());
        assert!(rec.frames.is_empty());
    }

    #[test]
    fn test_redraw_only_when_marker_moves() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        // 48px track: 2px per hour, so ten minutes don't move the marker
        bar.configure(4, 48);
        assert_eq!(bar.hour_tick(), 2);

        assert!(bar.tick(&mut rec, tod(10, 0)).unwrap());
        assert!(!bar.tick(&mut rec, tod(10, 0)).unwrap());
        assert!(!bar.tick(&mut rec, tod(10, 10)).unwrap());
        assert!(bar.tick(&mut rec, tod(10, 30)).unwrap());
        assert_eq!(rec.frames.len(), 2);
    }

    #[test]
    fn test_exposure_forces_redraw() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.configure(4, 1080);
        assert!(bar.tick(&mut rec, tod(9, 15)).unwrap());
        bar.handle(BarEvent::Exposed, &mut rec).unwrap();
        assert!(bar.tick(&mut rec, tod(9, 15)).unwrap());
        assert_eq!(rec.frames.len(), 2);
        assert_eq!(rec.frames[0], rec.frames[1]);
    }

    #[test]
    fn test_first_tick_draws_even_at_minus_one() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.configure(4, 48);
        // 2*1 + 0 - 3
        assert!(bar.tick(&mut rec, tod(1, 0)).unwrap());
        assert_eq!(rec.frames[0].marker.y, -1);
    }

    #[test]
    fn test_reconfigure_redraws() {
        let mut bar = Bar::new(&settings(Orientation::Bottom));
        let mut rec = Recorder::default();
        bar.configure(1920, 4);
        bar.tick(&mut rec, tod(12, 0)).unwrap();
        bar.configure(1920, 4);
        assert!(bar.tick(&mut rec, tod(12, 0)).unwrap());
    }

    #[test]
    fn test_frame_layout_vertical() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.configure(4, 1080);
        bar.tick(&mut rec, tod(12, 30)).unwrap();

        let frame = &rec.frames[0];
        assert_eq!(frame.marker, Rect { x: 0, y: 45 * 12 + 22 - 3, w: 4, h: 6 });
        assert_eq!(frame.hour_ticks.len(), 23);
        assert_eq!(frame.hour_ticks[0], Rect { x: 0, y: 45, w: 4, h: 2 });
        assert_eq!(frame.hour_ticks[22], Rect { x: 0, y: 45 * 23, w: 4, h: 2 });
        let ys: Vec<i32> = frame.highlights.iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![135, 270, 405, 540, 675, 810, 945]);
    }

    #[test]
    fn test_frame_layout_horizontal() {
        let mut s = settings(Orientation::Top);
        s.highlights = vec![14.5];
        let mut bar = Bar::new(&s);
        let mut rec = Recorder::default();
        bar.configure(1920, 6);
        bar.tick(&mut rec, tod(0, 0)).unwrap();

        let frame = &rec.frames[0];
        assert_eq!(frame.marker, Rect { x: -3, y: 0, w: 6, h: 6 });
        assert_eq!(frame.hour_ticks[1], Rect { x: 160, y: 0, w: 2, h: 6 });
        assert_eq!(frame.highlights, vec![Rect { x: 1160, y: 0, w: 2, h: 6 }]);
    }

    #[test]
    fn test_custom_bias() {
        let mut s = settings(Orientation::Top);
        s.marker_bias = 0;
        let mut bar = Bar::new(&s);
        let mut rec = Recorder::default();
        bar.configure(1920, 4);
        bar.tick(&mut rec, tod(6, 0)).unwrap();
        assert_eq!(rec.frames[0].marker.x, 480);
    }

    #[test]
    fn test_popup_is_created_once_and_reused() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.set_screen(1920, 1080);

        bar.handle(BarEvent::PointerEnter { at: at(14, 30) }, &mut rec).unwrap();
        assert_eq!(bar.popup_state(), PopupState::Shown);
        bar.handle(BarEvent::PointerLeave, &mut rec).unwrap();
        assert_eq!(bar.popup_state(), PopupState::Hidden);
        bar.handle(BarEvent::PointerEnter { at: at(14, 31) }, &mut rec).unwrap();

        assert_eq!(rec.created.len(), 1);
        assert_eq!(rec.moved.len(), 1);
        assert_eq!(rec.hidden, vec![1]);
        assert_eq!(
            rec.shown,
            vec![
                (1, "14:30 Sunday 18 October 2026".to_string()),
                (1, "14:31 Sunday 18 October 2026".to_string()),
            ]
        );
        assert_eq!(bar.popup(), Some(&1));
    }

    #[test]
    fn test_popup_centred_on_screen() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.set_screen(1920, 1080);
        bar.handle(BarEvent::PointerEnter { at: at(14, 30) }, &mut rec).unwrap();

        // 28 chars * 10px + 2 * 2px padding
        let area = rec.created[0];
        assert_eq!((area.w, area.h), (284, 24));
        assert_eq!((area.x, area.y), (818, 528));
    }

    #[test]
    fn test_popup_clamped_to_small_screen() {
        let mut bar: Bar<u32> = Bar::new(&settings(Orientation::Right));
        bar.set_screen(200, 20);
        let area = bar.popup_area(290, 20);
        assert_eq!(area, Rect { x: 1, y: 1, w: 198, h: 18 });
    }

    #[test]
    fn test_popup_area_saturates() {
        let mut s = settings(Orientation::Right);
        s.popup_padding = 3_000_000_000;
        let mut bar: Bar<u32> = Bar::new(&s);
        assert_eq!(bar.popup_area(u32::MAX, 20), Rect { x: 0, y: 0, w: u32::MAX, h: u32::MAX });
        bar.set_screen(1920, 1080);
        assert_eq!(bar.popup_area(290, 20), Rect { x: 1, y: 1, w: 1918, h: 1078 });
    }

    #[test]
    fn test_leave_without_popup_is_harmless() {
        let mut bar: Bar<u32> = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.handle(BarEvent::PointerLeave, &mut rec).unwrap();
        assert!(rec.hidden.is_empty());
        assert_eq!(bar.popup_state(), PopupState::Hidden);
    }

    #[test]
    fn test_shutdown_destroys_popup_once() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.handle(BarEvent::PointerEnter { at: at(8, 0) }, &mut rec).unwrap();
        bar.shutdown(&mut rec);
        bar.shutdown(&mut rec);
        assert_eq!(rec.destroyed, vec![1]);
        assert!(bar.popup().is_none());
    }

    #[test]
    fn test_forgotten_popup_is_recreated() {
        let mut bar = Bar::new(&settings(Orientation::Right));
        let mut rec = Recorder::default();
        bar.handle(BarEvent::PointerEnter { at: at(8, 0) }, &mut rec).unwrap();
        assert_eq!(bar.forget_popup(), Some(1));
        bar.handle(BarEvent::PointerEnter { at: at(8, 1) }, &mut rec).unwrap();
        assert_eq!(rec.created.len(), 2);
        assert_eq!(bar.popup(), Some(&2));
    }

    #[test]
    fn test_thickness_clamped_to_screen() {
        let mut s = settings(Orientation::Bottom);
        s.thickness = 5000;
        let mut bar: Bar<u32> = Bar::new(&s);
        assert_eq!(bar.set_screen(1920, 1080), Some(1079));
        assert_eq!(bar.thickness(), 1079);
        assert_eq!(bar.set_screen(1920, 1080), None);

        let mut bar: Bar<u32> = Bar::new(&settings(Orientation::Left));
        assert_eq!(bar.set_screen(1920, 1080), None);
        assert_eq!(bar.thickness(), 4);
    }
}
