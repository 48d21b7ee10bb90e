use egui::Slider;

use crate::PaintApp;
use crate::state::context::MAX_FEATHER;
use crate::state::{DrawingMode, EraserSettings, LayerTool};

pub fn tools_panel(app: &mut PaintApp, ctx: &egui::Context) {
    egui::SidePanel::left("tools_panel")
        .resizable(true)
        .default_width(220.0)
        .show(ctx, |ui| {
            app.set_tools_panel_rect(ui.max_rect());

            ui.heading("Region Paint");
            if app.editor().document().is_none() {
                ui.label("Drop an image onto the window to begin.");
                return;
            }
            ui.separator();

            history_section(app, ui);
            ui.separator();
            selection_section(app, ui);
            ui.separator();
            prompt_section(app, ui);

            if app.editor().staged_layer().is_some() {
                ui.separator();
                layer_section(app, ui);
            }

            ui.separator();
            #[cfg(not(target_arch = "wasm32"))]
            if ui.button("Export PNG").clicked() {
                app.export_to_disk();
            }
        });
}

fn history_section(app: &mut PaintApp, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        let can_undo = app.editor().can_undo();
        let can_redo = app.editor().can_redo();

        if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
            app.editor_mut().undo();
        }
        if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
            app.editor_mut().redo();
        }
    });

    if let Some(document) = app.editor().document() {
        let history = document.history();
        ui.label(format!(
            "{}x{}, edit {} of {}",
            document.width(),
            document.height(),
            history.cursor() + 1,
            history.len()
        ));
    }
}

fn selection_section(app: &mut PaintApp, ui: &mut egui::Ui) {
    let has_selection = app.editor().selection().is_some();
    let mode = app.editor().drawing_mode();
    let processing = app.editor().is_processing();

    ui.label("Selection");
    ui.horizontal(|ui| {
        let modes = [
            (DrawingMode::None, "◻ Select"),
            (DrawingMode::Brush, "🖌 Mask"),
            (DrawingMode::Eraser, "⌫ Erase mask"),
        ];
        for (candidate, label) in modes {
            let enabled = !processing && (candidate == DrawingMode::None || has_selection);
            let response = ui.add_enabled(enabled, egui::SelectableLabel::new(mode == candidate, label));
            if response.clicked() {
                log::info!("Drawing mode selected from UI: {:?}", candidate);
                app.editor_mut().set_drawing_mode(candidate);
            }
        }
    });

    if !has_selection {
        ui.weak("Drag on the image to select a region.");
        return;
    }

    let masks = app.editor().masks();
    ui.label(format!("{} mask(s)", masks.len()));
    let has_selected_mask = masks.selected().is_some();
    ui.horizontal(|ui| {
        if ui
            .add_enabled(!processing && has_selected_mask, egui::Button::new("Delete mask"))
            .clicked()
        {
            app.editor_mut().delete_selected_mask();
        }
        if ui
            .add_enabled(!processing, egui::Button::new("Clear selection"))
            .clicked()
        {
            app.editor_mut().clear_selection();
        }
    });

    let references = app.editor().reference_images().len();
    if references > 0 {
        ui.label("Reference images");
        let mut remove = None;
        for i in 0..references {
            ui.horizontal(|ui| {
                ui.label(format!("#{}", i + 1));
                if ui.add_enabled(!processing, egui::Button::new("✖").small()).clicked() {
                    remove = Some(i);
                }
            });
        }
        if let Some(i) = remove {
            app.editor_mut().remove_reference_image(i);
        }
    } else {
        ui.weak("Drop an image to add a style reference.");
    }
}

fn prompt_section(app: &mut PaintApp, ui: &mut egui::Ui) {
    let processing = app.editor().is_processing();
    ui.label("Prompt");
    ui.add_enabled(
        !processing,
        egui::TextEdit::multiline(app.prompt_mut())
            .hint_text("Describe the change")
            .desired_rows(3),
    );

    ui.horizontal(|ui| {
        if ui
            .add_enabled(app.can_generate(), egui::Button::new("Generate"))
            .clicked()
        {
            app.start_generation();
        }
        if processing {
            ui.spinner();
            ui.label("Generating…");
        }
    });
}

fn layer_section(app: &mut PaintApp, ui: &mut egui::Ui) {
    ui.label("Generated layer");

    let tool = app.editor().layer_tool();
    ui.horizontal(|ui| {
        if ui.selectable_label(tool == LayerTool::Move, "✋ Move").clicked() {
            app.editor_mut().set_layer_tool(LayerTool::Move);
        }
        if ui.selectable_label(tool == LayerTool::Eraser, "⌫ Eraser").clicked() {
            app.editor_mut().set_layer_tool(LayerTool::Eraser);
        }
    });

    if tool == LayerTool::Eraser {
        let mut eraser: EraserSettings = app.editor().eraser();
        let size = ui.add(Slider::new(&mut eraser.size, 5.0..=200.0).text("Size"));
        let softness = ui.add(Slider::new(&mut eraser.softness, 0.0..=100.0).text("Softness"));
        if size.changed() || softness.changed() {
            app.editor_mut().set_eraser(eraser);
        }
    }

    let Some(mut feather) = app.editor().staged_layer().map(|l| l.feather) else {
        return;
    };
    let response = ui.add(Slider::new(&mut feather, 0.0..=MAX_FEATHER).text("Feather"));
    if response.drag_started() {
        app.editor_mut().begin_feather_adjust();
    }
    if response.changed() {
        let dragging = app.editor().is_adjusting_feather();
        let editor = app.editor_mut();
        if !dragging {
            editor.begin_feather_adjust();
        }
        editor.set_feather(feather);
        if !dragging {
            editor.end_feather_adjust();
        }
    }
    if response.drag_stopped() {
        app.editor_mut().end_feather_adjust();
    }

    ui.horizontal(|ui| {
        let can_undo = app.editor().layer_history().can_undo();
        let can_redo = app.editor().layer_history().can_redo();
        if ui.add_enabled(can_undo, egui::Button::new("Undo layer")).clicked() {
            app.editor_mut().undo_layer();
        }
        if ui.add_enabled(can_redo, egui::Button::new("Redo layer")).clicked() {
            app.editor_mut().redo_layer();
        }
    });

    ui.horizontal(|ui| {
        if ui.button("✔ Apply").clicked() {
            app.editor_mut().commit_layer();
        }
        if ui.button("✖ Discard").clicked() {
            app.editor_mut().cancel_layer();
        }
    });
}
