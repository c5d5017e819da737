use crate::game::{ClientGameState, ProxySink};
use crate::iso::IsoProjection;
use macroquad::prelude::*;
use shared::{GridBounds, PlayerRecord, SessionId, Tile, FLIGHT_LATENCY_MS, MAX_INVENTORY};
use std::collections::HashMap;

const NOTICE_MS: u64 = 2000;
const MAX_NOTICES: usize = 4;
const PLAYER_RADIUS: f32 = 10.0;
const PROJECTILE_ARC: f32 = 40.0;

/// Render-side stand-in for a remote player
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    pub record: PlayerRecord,
}

impl Proxy {
    /// Eliminated players stay tracked but are not drawn
    pub fn visible(&self) -> bool {
        self.record.alive
    }
}

/// A projectile in flight, purely cosmetic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileVisual {
    pub from: Tile,
    pub to: Tile,
    pub started_at: u64,
}

impl ProjectileVisual {
    /// Screen position at `now`, or None once the flight is over
    pub fn position(&self, now: u64, projection: &IsoProjection) -> Option<(f32, f32)> {
        let elapsed = now.saturating_sub(self.started_at);
        if elapsed >= FLIGHT_LATENCY_MS {
            return None;
        }

        let t = elapsed as f32 / FLIGHT_LATENCY_MS as f32;
        let (x0, y0) = projection.to_screen(self.from);
        let (x1, y1) = projection.to_screen(self.to);
        let lift = 4.0 * t * (1.0 - t) * PROJECTILE_ARC;

        Some((x0 + (x1 - x0) * t, y0 + (y1 - y0) * t - lift))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    text: String,
    expires_at: u64,
}

pub struct Renderer {
    width: f32,
    height: f32,
    proxies: HashMap<SessionId, Proxy>,
    projectiles: Vec<ProjectileVisual>,
    notices: Vec<Notice>,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
            proxies: HashMap::new(),
            projectiles: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn proxy(&self, id: &SessionId) -> Option<&Proxy> {
        self.proxies.get(id)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn add_projectile(&mut self, from: Tile, to: Tile, now: u64) {
        self.projectiles.push(ProjectileVisual {
            from,
            to,
            started_at: now,
        });
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn notify(&mut self, text: impl Into<String>, now: u64) {
        self.notices.push(Notice {
            text: text.into(),
            expires_at: now + NOTICE_MS,
        });
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }

    pub fn notices(&self) -> impl Iterator<Item = &str> {
        self.notices.iter().map(|n| n.text.as_str())
    }

    /// Drops finished projectile visuals and expired notices
    pub fn prune(&mut self, now: u64) {
        self.projectiles
            .retain(|p| now.saturating_sub(p.started_at) < FLIGHT_LATENCY_MS);
        self.notices.retain(|n| now < n.expires_at);
    }

    pub fn render(
        &mut self,
        state: &ClientGameState,
        projection: &IsoProjection,
        bounds: GridBounds,
        destination: Option<Tile>,
        now: u64,
    ) {
        self.prune(now);
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_grid(projection, bounds, destination);

        for proxy in self.proxies.values().filter(|p| p.visible()) {
            let (x, y) = projection.to_screen(proxy.record.tile());
            draw_circle(x, y - PLAYER_RADIUS, PLAYER_RADIUS, Color::from_rgba(255, 68, 68, 255));
            draw_text(proxy.record.id.as_str(), x - 20.0, y - 24.0, 14.0, WHITE);
        }

        if state.session_id().is_some() {
            let (x, y) = projection.to_screen(state.local.tile);
            let color = if state.local.alive { GREEN } else { GRAY };
            draw_circle(x, y - PLAYER_RADIUS, PLAYER_RADIUS, color);
            draw_circle_lines(x, y - PLAYER_RADIUS, PLAYER_RADIUS, 2.0, WHITE);
        }

        for projectile in &self.projectiles {
            if let Some((x, y)) = projectile.position(now, projection) {
                draw_circle(x, y, 4.0, WHITE);
            }
        }

        self.draw_ui(state);
    }

    fn draw_grid(&self, projection: &IsoProjection, bounds: GridBounds, destination: Option<Tile>) {
        let line = Color::from_rgba(68, 68, 68, 255);
        for x in 0..bounds.width {
            for y in 0..bounds.height {
                let tile = Tile::new(x, y);
                let [top, right, bottom, left] = projection.diamond(tile);
                if destination == Some(tile) {
                    let fill = Color::from_rgba(60, 90, 60, 255);
                    draw_triangle(top.into(), right.into(), bottom.into(), fill);
                    draw_triangle(top.into(), bottom.into(), left.into(), fill);
                }
                draw_line(top.0, top.1, right.0, right.1, 1.0, line);
                draw_line(right.0, right.1, bottom.0, bottom.1, 1.0, line);
                draw_line(bottom.0, bottom.1, left.0, left.1, 1.0, line);
                draw_line(left.0, left.1, top.0, top.1, 1.0, line);
            }
        }
    }

    fn draw_ui(&self, state: &ClientGameState) {
        let connection_color = if state.session_id().is_some() { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        draw_text("CON", 20.0, 18.0, 12.0, WHITE);

        let status = if state.local.alive {
            format!("Projectiles {}/{}", state.local.inventory, MAX_INVENTORY)
        } else {
            "Eliminated - press R to revive".to_string()
        };
        draw_text(&status, 10.0, 36.0, 16.0, WHITE);
        draw_text("Click: move  Right click: throw  G: pick up", 10.0, self.height - 10.0, 14.0, GRAY);

        let board_x = self.width - 180.0;
        draw_text("Score", board_x, 18.0, 16.0, WHITE);
        for (i, player) in state.scoreboard().iter().take(8).enumerate() {
            let color = if state.is_local(&player.id) { GREEN } else { WHITE };
            let line = format!("{:<14} {}", player.id, player.score);
            draw_text(&line, board_x, 36.0 + i as f32 * 16.0, 14.0, color);
        }

        for (i, text) in self.notices().enumerate() {
            draw_text(text, 10.0, 60.0 + i as f32 * 18.0, 16.0, YELLOW);
        }
    }
}

impl ProxySink for Renderer {
    fn spawn_proxy(&mut self, player: &PlayerRecord) {
        self.proxies.insert(
            player.id.clone(),
            Proxy {
                record: player.clone(),
            },
        );
    }

    fn update_proxy(&mut self, player: &PlayerRecord) {
        match self.proxies.get_mut(&player.id) {
            Some(proxy) => proxy.record = player.clone(),
            None => self.spawn_proxy(player),
        }
    }

    fn despawn_proxy(&mut self, id: &SessionId) {
        self.proxies.remove(id);
    }
}
