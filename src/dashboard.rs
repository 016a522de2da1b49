//! Dashboard GUI
//!
//! Renders the session state each frame and forwards user actions to the
//! controller. Backend calls run on the tokio runtime and request a repaint
//! when they finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use eframe::egui;
use egui_phosphor::regular::*;
use tokio::runtime::Handle;

use crate::config::ProviderMode;
use crate::controller::SessionController;
use crate::session::{SessionState, MAX_INPUT_CHARS};

/// Dashboard application state
pub struct Dashboard {
    controller: Arc<SessionController>,
    runtime: Handle,
    current_tab: DashboardTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardTab {
    Optimize,
    History,
    Settings,
}

impl Dashboard {
    /// Create the dashboard and start loading presets, key state, settings and history
    pub fn new(controller: Arc<SessionController>, runtime: Handle, ctx: &egui::Context) -> Self {
        let dashboard = Self {
            controller,
            runtime,
            current_tab: DashboardTab::Optimize,
        };
        dashboard.spawn(ctx, |c| async move { c.initialize().await });
        dashboard
    }

    /// Run the dashboard
    pub fn run(controller: Arc<SessionController>, runtime: Handle) -> Result<(), eframe::Error> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([820.0, 640.0])
                .with_min_inner_size([375.0, 480.0])
                .with_title("Contentizer"),
            ..Default::default()
        };

        eframe::run_native(
            "Contentizer",
            options,
            Box::new(move |cc| {
                let mut fonts = egui::FontDefinitions::default();
                egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
                cc.egui_ctx.set_fonts(fonts);

                Ok(Box::new(Dashboard::new(controller, runtime, &cc.egui_ctx)))
            }),
        )
    }

    /// Run a controller operation in the background and repaint when done
    fn spawn<F, Fut>(&self, ctx: &egui::Context, f: F)
    where
        F: FnOnce(Arc<SessionController>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ctx = ctx.clone();
        let task = f(Arc::clone(&self.controller));
        self.runtime.spawn(async move {
            task.await;
            ctx.request_repaint();
        });
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}

impl eframe::App for Dashboard {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.controller.snapshot();

        // Pending requests and the copy indicator change without user input
        if state.is_loading() || state.copied {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.heading(format!("{} Contentizer", MAGIC_WAND));
                ui.add_space(20.0);

                for (tab, label) in [
                    (DashboardTab::Optimize, format!("{} Optimize", MAGIC_WAND)),
                    (DashboardTab::History, format!("{} History", CLOCK_COUNTER_CLOCKWISE)),
                    (DashboardTab::Settings, format!("{} Settings", GEAR)),
                ] {
                    if ui.selectable_label(self.current_tab == tab, label).clicked() {
                        self.current_tab = tab;
                    }
                }
            });
            ui.add_space(5.0);
        });

        if let Some(error) = &state.error {
            egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
                ui.colored_label(ui.visuals().error_fg_color, error.as_str());
            });
        }

        match self.current_tab {
            DashboardTab::Optimize => self.show_optimize_tab(ctx, &state),
            DashboardTab::History => self.show_history_tab(ctx, &state),
            DashboardTab::Settings => self.show_settings_tab(ctx, &state),
        }
    }
}

impl Dashboard {
    fn show_optimize_tab(&self, ctx: &egui::Context, state: &SessionState) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if !state.is_api_key_ready {
                self.show_api_key_gate(ui, ctx, state);
                ui.add_space(10.0);
            }

            ui.add_enabled_ui(!state.is_loading(), |ui| {
                ui.horizontal(|ui| {
                    let Some(presets) = &state.presets else {
                        ui.label("Loading presets...");
                        return;
                    };

                    ui.label("Category:");
                    egui::ComboBox::from_id_salt("category_combo")
                        .selected_text(state.category.as_str())
                        .show_ui(ui, |ui| {
                            for category in &presets.categories {
                                if ui.selectable_label(&state.category == category, category.as_str()).clicked() {
                                    self.controller.select_category(category.clone());
                                }
                            }
                        });

                    ui.label("Style:");
                    egui::ComboBox::from_id_salt("style_combo")
                        .selected_text(state.style.as_str())
                        .show_ui(ui, |ui| {
                            for style in &presets.styles {
                                if ui.selectable_label(&state.style == style, style.as_str()).clicked() {
                                    self.controller.select_style(style.clone());
                                }
                            }
                        });
                });

                ui.add_space(5.0);
                let mut extra = state.extra_instructions.clone();
                let edit = egui::TextEdit::singleline(&mut extra)
                    .hint_text("Extra instructions (optional)")
                    .desired_width(f32::INFINITY);
                if ui.add(edit).changed() {
                    self.controller.edit_extra_instructions(extra);
                }
            });

            ui.add_space(10.0);

            let mut text = state.text.clone();
            egui::ScrollArea::vertical()
                .id_salt("text_scroll")
                .max_height(ui.available_height() - 80.0)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    let edit = egui::TextEdit::multiline(&mut text)
                        .hint_text("Paste or type the text to optimize...")
                        .desired_width(f32::INFINITY)
                        .desired_rows(12)
                        .interactive(!state.is_loading());
                    if ui.add(edit).changed() {
                        self.controller.edit_text(text.clone());
                    }
                });

            let chars = state.text.trim().chars().count();
            let counter = format!("{} / {}", chars, MAX_INPUT_CHARS);
            if chars > MAX_INPUT_CHARS {
                ui.colored_label(ui.visuals().error_fg_color, counter);
            } else {
                ui.weak(counter);
            }

            ui.add_space(5.0);
            ui.horizontal(|ui| {
                let optimize_label = if state.is_loading() {
                    "Optimizing...".to_string()
                } else {
                    format!("{} Optimize", MAGIC_WAND)
                };
                if ui
                    .add_enabled(state.can_submit(), egui::Button::new(optimize_label))
                    .clicked()
                {
                    let input = state.text.clone();
                    self.spawn(ctx, |c| async move {
                        let _ = c.optimize(&input).await;
                    });
                }

                let regenerate_label = format!(
                    "{} Regenerate ({} left)",
                    ARROWS_CLOCKWISE,
                    state.regenerations_left()
                );
                if ui
                    .add_enabled(state.can_regenerate(), egui::Button::new(regenerate_label))
                    .clicked()
                {
                    self.spawn(ctx, |c| async move {
                        let _ = c.regenerate().await;
                    });
                }

                let copy_label = if state.copied {
                    format!("{} Copied", CHECK)
                } else {
                    format!("{} Copy", COPY)
                };
                if ui
                    .add_enabled(!state.text.trim().is_empty(), egui::Button::new(copy_label))
                    .clicked()
                {
                    self.controller.copy();
                }

                if ui
                    .add_enabled(!state.is_loading(), egui::Button::new(format!("{} Clear", X)))
                    .clicked()
                {
                    self.controller.clear_text();
                }

                if state.is_loading() {
                    ui.spinner();
                }
            });
        });
    }

    fn show_api_key_gate(&self, ui: &mut egui::Ui, ctx: &egui::Context, state: &SessionState) {
        ui.group(|ui| {
            ui.label(format!("{} An API key is required before optimizing.", KEY));
            ui.horizontal(|ui| {
                let mut key = state.api_key_input.clone();
                let edit = egui::TextEdit::singleline(&mut key)
                    .password(true)
                    .hint_text("sk-...");
                if ui.add(edit).changed() {
                    self.controller.edit_api_key_input(key);
                }

                if ui.button(format!("{} Save key", FLOPPY_DISK)).clicked() {
                    let key = state.api_key_input.clone();
                    self.spawn(ctx, |c| async move {
                        let _ = c.save_api_key(&key).await;
                    });
                }
            });
        });
    }

    fn show_history_tab(&self, ctx: &egui::Context, state: &SessionState) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(format!("{} History", CLOCK_COUNTER_CLOCKWISE));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let clear = egui::Button::new(format!("{} Clear All", TRASH));
                    if ui.add_enabled(!state.is_loading() && !state.history.is_empty(), clear).clicked() {
                        self.spawn(ctx, |c| async move {
                            let _ = c.clear_history().await;
                        });
                    }
                    if ui.button(format!("{} Refresh", ARROWS_CLOCKWISE)).clicked() {
                        self.spawn(ctx, |c| async move {
                            let _ = c.load_history().await;
                        });
                    }
                });
            });

            ui.add_space(10.0);
            ui.separator();
            ui.add_space(5.0);

            if state.history.is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label("No history yet.\nOptimized texts will appear here.");
                });
                return;
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                for item in &state.history {
                    ui.group(|ui| {
                        ui.set_width(ui.available_width());
                        ui.horizontal(|ui| {
                            ui.weak(item.formatted_time());
                            ui.label(format!("{} · {}", item.category, item.style));
                        });
                        ui.horizontal(|ui| {
                            ui.label("Original:");
                            ui.add(egui::Label::new(item.original_preview.as_str()).wrap());
                        });
                        ui.horizontal(|ui| {
                            ui.label("Result:");
                            ui.add(egui::Label::new(item.optimized_preview.as_str()).wrap());
                        });
                    });
                    ui.add_space(5.0);
                }
            });
        });
    }

    fn show_settings_tab(&self, ctx: &egui::Context, state: &SessionState) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(format!("{} Settings", GEAR));
            ui.add_space(20.0);

            let Some(settings) = &state.settings else {
                ui.label("Loading settings...");
                return;
            };
            let mut draft = settings.clone();
            let mut changed = false;

            egui::Grid::new("settings_grid")
                .num_columns(2)
                .spacing([40.0, 10.0])
                .show(ui, |ui| {
                    ui.label("API key mode:");
                    egui::ComboBox::from_id_salt("provider_mode_combo")
                        .selected_text(draft.provider_mode.display_name())
                        .show_ui(ui, |ui| {
                            for mode in ProviderMode::ALL {
                                changed |= ui
                                    .selectable_value(&mut draft.provider_mode, mode, mode.display_name())
                                    .changed();
                            }
                        });
                    ui.end_row();

                    ui.label("API base URL:");
                    let mut base_url = draft.api_base_url.clone().unwrap_or_default();
                    let edit = egui::TextEdit::singleline(&mut base_url).hint_text(crate::llm::DEFAULT_BASE_URL);
                    if ui.add(edit).changed() {
                        draft.api_base_url = Some(base_url);
                        changed = true;
                    }
                    ui.end_row();

                    ui.label("Model:");
                    let mut model = draft.model.clone().unwrap_or_default();
                    let edit = egui::TextEdit::singleline(&mut model).hint_text(crate::llm::DEFAULT_MODEL);
                    if ui.add(edit).changed() {
                        draft.model = Some(model);
                        changed = true;
                    }
                    ui.end_row();
                });

            ui.add_space(5.0);
            ui.weak(match draft.provider_mode {
                ProviderMode::Env => "Set CONTENTIZER_API_KEY in your environment. A saved key is used when it is unset.",
                ProviderMode::Keychain => "Uses the key saved from the Optimize tab.",
            });

            if changed {
                self.controller.edit_settings(draft);
            }

            ui.add_space(20.0);
            ui.horizontal(|ui| {
                if ui.button(format!("{} Save settings", FLOPPY_DISK)).clicked() {
                    self.spawn(ctx, |c| async move {
                        let _ = c.save_settings().await;
                    });
                }
                if state.settings_saved {
                    ui.label(format!("{} Settings saved.", CHECK));
                }
            });
        });
    }
}
