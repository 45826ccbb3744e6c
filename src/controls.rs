//! Simulation control window.
//!
//! Plan/Stop records a take, Play/Stop replays it, and the slider follows
//! playback progress until the user grabs it to scrub.

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use sim_replay::simulation::{
    PlaybackEnded, PlaybackProgress, SimulationCommand, SimulationHelper, SimulationMode,
    TakeSummary,
};

/// Coordinator state the panel renders from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationView {
    pub mode: SimulationMode,
    pub sample_count: usize,
    pub last_take: Option<TakeSummary>,
}

impl From<&SimulationHelper> for SimulationView {
    fn from(helper: &SimulationHelper) -> Self {
        Self {
            mode: helper.mode(),
            sample_count: helper.sample_count(),
            last_take: helper.last_take().copied(),
        }
    }
}

#[derive(Resource, Default)]
pub struct ControlPanelState {
    pub view: SimulationView,
    pub slider_value: f32,
    pub slider_dragging: bool,
    /// The demo scene allows one take per run
    pub take_locked: bool,
    /// Commands queued by the UI this frame
    pub pending: Vec<SimulationCommand>,
}

impl ControlPanelState {
    pub fn toggle_recording(&mut self) {
        match self.view.mode {
            SimulationMode::Recording => {
                self.pending.push(SimulationCommand::StopRecording);
                self.take_locked = true;
            }
            SimulationMode::Idle if !self.take_locked => {
                self.pending.push(SimulationCommand::StartRecording);
            }
            _ => {}
        }
    }

    pub fn toggle_playback(&mut self) {
        match self.view.mode {
            SimulationMode::Playback => self.pending.push(SimulationCommand::StopPlayback),
            SimulationMode::Idle if self.view.sample_count > 0 => {
                self.pending.push(SimulationCommand::StartPlayback);
            }
            _ => {}
        }
    }

    /// Follow playback unless the user is holding the slider.
    pub fn apply_progress(&mut self, fraction: f32) {
        if !self.slider_dragging {
            self.slider_value = fraction;
        }
    }
}

/// Render the control window. Clicks are queued in `state.pending`.
pub fn render_control_panel_ui(ctx: &egui::Context, state: &mut ControlPanelState) {
    egui::Window::new("Simulation")
        .collapsible(true)
        .resizable(false)
        .default_width(240.0)
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
        .show(ctx, |ui| {
            let mode = state.view.mode;
            ui.label(format!("State: {}", mode.label()));
            if mode == SimulationMode::Recording {
                ui.label(
                    egui::RichText::new(format!("REC {} samples", state.view.sample_count))
                        .color(egui::Color32::RED)
                        .strong(),
                );
            }

            ui.separator();

            ui.horizontal(|ui| {
                let recording = mode == SimulationMode::Recording;
                let can_plan = recording || (mode == SimulationMode::Idle && !state.take_locked);
                let plan_label = if recording { "Stop" } else { "Plan" };
                if ui.add_enabled(can_plan, egui::Button::new(plan_label)).clicked() {
                    state.toggle_recording();
                }

                let playing = mode == SimulationMode::Playback;
                let can_play = playing || (mode == SimulationMode::Idle && state.view.sample_count > 0);
                let play_label = if playing { "Stop" } else { "Play" };
                if ui.add_enabled(can_play, egui::Button::new(play_label)).clicked() {
                    state.toggle_playback();
                }
            });

            let can_scrub = mode != SimulationMode::Recording && state.view.sample_count > 0;
            let response = ui.add_enabled(
                can_scrub,
                egui::Slider::new(&mut state.slider_value, 0.0..=1.0).show_value(false),
            );
            if response.drag_started() {
                state.slider_dragging = true;
            }
            if response.drag_stopped() {
                state.slider_dragging = false;
                state.pending.push(SimulationCommand::SetPlaybackPosition(state.slider_value));
            } else if response.changed() && !response.dragged() {
                state.pending.push(SimulationCommand::SetPlaybackPosition(state.slider_value));
            }

            ui.separator();

            match &state.view.last_take {
                Some(take) => ui.label(
                    egui::RichText::new(format!(
                        "Last take: {} | {} samples | {:.2}s",
                        take.started_at.format("%H:%M:%S"),
                        take.sample_count,
                        take.duration_ms / 1000.0
                    ))
                    .size(11.0)
                    .color(egui::Color32::GRAY),
                ),
                None => ui.label(
                    egui::RichText::new("No take recorded")
                        .size(11.0)
                        .color(egui::Color32::GRAY),
                ),
            };
        });
}

/// System that renders the panel and forwards queued commands.
pub fn render_control_panel(
    mut contexts: EguiContexts,
    mut panel: ResMut<ControlPanelState>,
    helper: Res<SimulationHelper>,
    mut commands: MessageWriter<SimulationCommand>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };

    panel.view = SimulationView::from(&*helper);
    render_control_panel_ui(ctx, &mut panel);
    for command in panel.pending.drain(..) {
        commands.write(command);
    }
}

/// Move the slider with playback.
pub fn sync_progress_slider(
    mut progress: MessageReader<PlaybackProgress>,
    mut ended: MessageReader<PlaybackEnded>,
    mut panel: ResMut<ControlPanelState>,
) {
    for PlaybackProgress(fraction) in progress.read() {
        panel.apply_progress(*fraction);
    }
    if ended.read().count() > 0 {
        panel.apply_progress(1.0);
        debug!("Playback ended, control panel reset");
    }
}

/// R toggles recording, Space toggles playback.
pub fn simulation_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel: ResMut<ControlPanelState>,
    mut contexts: EguiContexts,
) {
    // Don't toggle if egui wants input
    if let Ok(ctx) = contexts.ctx_mut() {
        if ctx.wants_keyboard_input() {
            return;
        }
    }

    if keyboard.just_pressed(KeyCode::KeyR) {
        panel.toggle_recording();
    }
    if keyboard.just_pressed(KeyCode::Space) {
        panel.toggle_playback();
    }
}

pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlPanelState>()
            .add_systems(Update, (simulation_shortcuts, sync_progress_slider))
            .add_systems(EguiPrimaryContextPass, render_control_panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_kittest::{Harness, kittest::Queryable};

    fn panel(mode: SimulationMode, sample_count: usize) -> ControlPanelState {
        ControlPanelState {
            view: SimulationView {
                mode,
                sample_count,
                last_take: None,
            },
            ..default()
        }
    }

    fn harness(state: ControlPanelState) -> Harness<'static, ControlPanelState> {
        Harness::new_state(
            |ctx, state: &mut ControlPanelState| {
                render_control_panel_ui(ctx, state);
            },
            state,
        )
    }

    #[test]
    fn idle_panel_offers_plan_and_play() {
        let harness = harness(panel(SimulationMode::Idle, 0));

        harness.get_by_label("State: Idle");
        harness.get_by_label("Plan");
        harness.get_by_label("Play");
        harness.get_by_label("No take recorded");
    }

    #[test]
    fn recording_panel_shows_stop_and_sample_count() {
        let harness = harness(panel(SimulationMode::Recording, 42));

        harness.get_by_label("State: Recording");
        harness.get_by_label("REC 42 samples");
        harness.get_by_label("Stop");
    }

    #[test]
    fn clicking_plan_queues_start_recording() {
        let mut harness = harness(panel(SimulationMode::Idle, 0));

        harness.get_by_label("Plan").click();
        harness.run();

        assert_eq!(harness.state().pending, vec![SimulationCommand::StartRecording]);
    }

    #[test]
    fn clicking_play_queues_start_playback() {
        let mut harness = harness(panel(SimulationMode::Idle, 150));

        harness.get_by_label("Play").click();
        harness.run();

        assert_eq!(harness.state().pending, vec![SimulationCommand::StartPlayback]);
    }

    #[test]
    fn stopping_a_take_locks_further_takes() {
        let mut state = panel(SimulationMode::Recording, 10);
        state.toggle_recording();
        assert_eq!(state.pending, vec![SimulationCommand::StopRecording]);
        assert!(state.take_locked);

        state.pending.clear();
        state.view.mode = SimulationMode::Idle;
        state.toggle_recording();
        assert!(state.pending.is_empty());
    }

    #[test]
    fn playback_toggle_needs_samples() {
        let mut state = panel(SimulationMode::Idle, 0);
        state.toggle_playback();
        assert!(state.pending.is_empty());

        state.view.mode = SimulationMode::Playback;
        state.toggle_playback();
        assert_eq!(state.pending, vec![SimulationCommand::StopPlayback]);
    }

    #[test]
    fn slider_ignores_progress_while_dragging() {
        let mut state = panel(SimulationMode::Playback, 100);
        state.apply_progress(0.4);
        assert_eq!(state.slider_value, 0.4);

        state.slider_dragging = true;
        state.apply_progress(0.9);
        assert_eq!(state.slider_value, 0.4);
    }
}
