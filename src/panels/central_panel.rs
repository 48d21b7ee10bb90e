use crate::PaintApp;

/// The editing canvas: routes input to the editor, then draws it.
pub fn central_panel(app: &mut PaintApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            app.set_central_panel_rect(canvas_rect);
            app.fit_if_needed(canvas_rect.width());

            app.handle_input(ctx, canvas_rect);
            app.render(ctx, &painter, canvas_rect);

            if app.editor().document().is_none() {
                painter.text(
                    canvas_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Drop an image here to start editing",
                    egui::TextStyle::Heading.resolve(ui.style()),
                    ui.visuals().weak_text_color(),
                );
            }

            if response.hovered() || !app.editor().current_state().is_idle() {
                ctx.set_cursor_icon(app.editor().cursor());
            }
        });
}
