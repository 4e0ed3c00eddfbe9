use macroquad::prelude::*;

use crate::capture::{CapturePointView, ColorKey};
use crate::game::EntityView;
use crate::level::{skin_index, Frame, Layout, PlayFrame, SKIN_OPTIONS};

const PLAYER_SIZE: f32 = 32.0;

const PALETTE: [Color; 6] = [
    Color::new(0.27, 0.53, 1.0, 1.0),
    Color::new(1.0, 0.27, 0.27, 1.0),
    Color::new(0.27, 0.87, 0.4, 1.0),
    Color::new(1.0, 0.8, 0.2, 1.0),
    Color::new(0.8, 0.4, 1.0, 1.0),
    Color::new(0.0, 0.85, 0.85, 1.0),
];

fn key_color(key: ColorKey) -> Color {
    match key {
        ColorKey::Neutral => Color::from_rgba(136, 136, 136, 255),
        ColorKey::Player(id) => PALETTE[id as usize % PALETTE.len()],
    }
}

/// Draws a [`Frame`] into the macroquad window.
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, frame: &Frame, layout: &Layout) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        match frame {
            Frame::Menu { name, skin, notice } => {
                self.draw_menu(name, skin, notice.as_deref(), layout)
            }
            Frame::Play(play) => self.draw_play(play, layout),
            Frame::Info { title, lines } => self.draw_info(title, lines, layout),
        }
    }

    fn draw_play(&mut self, frame: &PlayFrame, layout: &Layout) {
        for point in &frame.capture_points {
            self.draw_capture_point(point, layout);
        }

        for entity in &frame.entities {
            self.draw_player(entity, layout);
        }

        let scores = format!("{}  :  {}", frame.scores.team1, frame.scores.team2);
        draw_text(&scores, layout.offset_x + 10.0, layout.offset_y + 24.0, 24.0, WHITE);
    }

    fn draw_capture_point(&mut self, point: &CapturePointView, layout: &Layout) {
        let (x, y) = layout.to_screen(point.position.x, point.position.y);
        let radius = point.radius * layout.scale;

        let mut fill = key_color(point.owner);
        fill.a = 0.25;
        draw_circle(x, y, radius, fill);
        draw_circle_lines(x, y, radius, 2.0, key_color(point.owner));

        if let Some(attacker) = point.attacker {
            let width = radius * 2.0;
            let bar_y = y + radius + 6.0;
            draw_rectangle(x - radius, bar_y, width, 6.0, Color::from_rgba(51, 51, 51, 255));
            draw_rectangle(x - radius, bar_y, width * point.progress, 6.0, key_color(attacker));
        }
    }

    fn draw_player(&mut self, entity: &EntityView, layout: &Layout) {
        let (x, y) = layout.to_screen(entity.pose.x, entity.pose.y);
        let size = PLAYER_SIZE * layout.scale;
        let color = if entity.is_local {
            GREEN
        } else {
            Color::from_rgba(255, 68, 68, 255)
        };

        draw_rectangle(x, y, size, size, color);
        draw_rectangle_lines(x, y, size, size, 2.0, WHITE);

        // Facing marker on the side the sprite looks towards.
        let marker_x = if entity.flip_x { x } else { x + size - 4.0 };
        draw_rectangle(marker_x, y + size / 2.0 - 2.0, 4.0, 4.0, WHITE);

        let label = if entity.name.is_empty() {
            format!("#{}", entity.id)
        } else {
            entity.name.clone()
        };
        draw_text(&label, x, y - 6.0, 16.0, WHITE);
    }

    fn draw_menu(&mut self, name: &str, skin: &str, notice: Option<&str>, layout: &Layout) {
        let (x, y) = layout.to_screen(100.0, 200.0);
        let title_size = 48.0 * layout.scale.max(0.5);
        let line_size = 28.0 * layout.scale.max(0.5);
        draw_text("Join game", x, y, title_size, WHITE);

        let selected = skin_index(skin).unwrap_or(0);
        let swatch = PALETTE[selected % PALETTE.len()];
        let row = y + title_size;
        draw_text(&format!("Name: {}", name), x, row, line_size, WHITE);
        draw_text(&format!("Skin: < {} >", skin), x, row + line_size * 1.4, line_size, swatch);

        let hint = notice.unwrap_or("Up/Down to change skin, Enter to join");
        draw_text(hint, x, row + line_size * 3.0, line_size * 0.8, GRAY);
        draw_text(
            &format!("{} of {}", selected + 1, SKIN_OPTIONS.len()),
            x,
            row + line_size * 4.0,
            line_size * 0.8,
            GRAY,
        );
    }

    fn draw_info(&mut self, title: &str, lines: &[String], layout: &Layout) {
        let (x, y) = layout.to_screen(100.0, 200.0);
        let title_size = 48.0 * layout.scale.max(0.5);
        draw_text(title, x, y, title_size, WHITE);

        let line_size = 24.0 * layout.scale.max(0.5);
        for (i, line) in lines.iter().enumerate() {
            draw_text(line, x, y + title_size + (i as f32) * line_size * 1.4, line_size, GRAY);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
