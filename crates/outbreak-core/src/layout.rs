//! Force-directed layout for the contact graph.
//!
//! A small velocity-Verlet simulation in the style of d3-force: link springs,
//! many-body repulsion, centering and collision avoidance, cooled by a
//! decaying `alpha`. The layout only moves when [`ForceLayout::tick`] is
//! called, so the caller decides the frame rate independently of how often
//! the simulation service is stepped.
//!
//! Many-body and collision forces are evaluated pairwise. That is quadratic,
//! but the service's populations are in the hundreds and the terminal redraws
//! at most ~60 times a second.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Logical drawing area the layout is centred in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Smallest accepted viewport edge.
const MIN_VIEWPORT_EDGE: f64 = 100.0;

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 400.0,
        }
    }
}

impl Viewport {
    /// Build a viewport, clamping each edge to at least 100 units. Non-finite
    /// sizes fall back to the default 600 x 400.
    pub fn new(width: f64, height: f64) -> Self {
        let fallback = Self::default();
        let edge = |v: f64, d: f64| {
            if v.is_finite() {
                v.max(MIN_VIEWPORT_EDGE)
            } else {
                d
            }
        };
        Self {
            width: edge(width, fallback.width),
            height: edge(height, fallback.height),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Force and cooling constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Rest length of a link spring.
    pub link_distance: f64,
    pub link_strength: f64,
    /// Negative values repel.
    pub charge_strength: f64,
    pub collide_radius: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        let alpha_min: f64 = 0.001;
        Self {
            link_distance: 30.0,
            link_strength: 0.1,
            charge_strength: -20.0,
            collide_radius: 6.0,
            velocity_decay: 0.4,
            alpha_min,
            // Cools from 1 to alpha_min in 300 ticks.
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
        }
    }
}

/// Alpha used when the link set changes under a running layout.
pub const REHEAT_ALPHA: f64 = 0.3;

const INITIAL_RADIUS: f64 = 10.0;
const JIGGLE_SEED: u64 = 1;

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Position and velocity of one node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// Phyllotaxis arrangement around `center`, so fresh nodes start evenly
/// spread and never coincide.
fn initial_bodies(count: usize, center: (f64, f64)) -> Vec<Body> {
    let angle_step = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    (0..count)
        .map(|i| {
            let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
            let angle = i as f64 * angle_step;
            Body {
                x: center.0 + radius * angle.cos(),
                y: center.1 + radius * angle.sin(),
                vx: 0.0,
                vy: 0.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ForceLayout
// ---------------------------------------------------------------------------

/// One layout run over a fixed node set.
#[derive(Debug, Clone)]
pub struct ForceLayout {
    params: LayoutParams,
    center: (f64, f64),
    bodies: Vec<Body>,
    links: Vec<(usize, usize)>,
    /// Share of each link's correction applied to its target.
    link_bias: Vec<f64>,
    alpha: f64,
    ticks: u64,
    rng: StdRng,
}

impl ForceLayout {
    /// Start a fresh run. `links` are index pairs into the node set; pairs
    /// out of range are ignored.
    pub fn new(
        node_count: usize,
        links: Vec<(usize, usize)>,
        viewport: Viewport,
        params: LayoutParams,
    ) -> Self {
        let center = viewport.center();
        let mut layout = Self {
            params,
            center,
            bodies: initial_bodies(node_count, center),
            links: Vec::new(),
            link_bias: Vec::new(),
            alpha: 1.0,
            ticks: 0,
            rng: StdRng::seed_from_u64(JIGGLE_SEED),
        };
        layout.set_links(links);
        layout
    }

    /// Replace the link set, keeping positions and velocities.
    pub fn set_links(&mut self, mut links: Vec<(usize, usize)>) {
        let n = self.bodies.len();
        links.retain(|&(s, t)| s < n && t < n);
        let mut degree = vec![0usize; n];
        for &(s, t) in &links {
            degree[s] += 1;
            degree[t] += 1;
        }
        self.link_bias = links
            .iter()
            .map(|&(s, t)| degree[s] as f64 / (degree[s] + degree[t]) as f64)
            .collect();
        self.links = links;
    }

    /// Raise alpha so the layout settles again after a change.
    pub fn reheat(&mut self, alpha: f64) {
        self.alpha = self.alpha.max(alpha);
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= self.params.alpha_min
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    /// Advance one iteration. Returns `false` once the layout has cooled and
    /// nothing moved.
    pub fn tick(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.alpha += (0.0 - self.alpha) * self.params.alpha_decay;
        let alpha = self.alpha;

        self.apply_links(alpha);
        self.apply_charge(alpha);
        self.apply_center();
        self.apply_collide();

        let keep = 1.0 - self.params.velocity_decay;
        for b in &mut self.bodies {
            b.vx *= keep;
            b.vy *= keep;
            b.x += b.vx;
            b.y += b.vy;
        }
        self.ticks += 1;
        true
    }

    fn jiggle(rng: &mut StdRng) -> f64 {
        (rng.random::<f64>() - 0.5) * 1e-6
    }

    fn apply_links(&mut self, alpha: f64) {
        let Self {
            params,
            bodies,
            links,
            link_bias,
            rng,
            ..
        } = self;
        for (&(s, t), &bias) in links.iter().zip(link_bias.iter()) {
            let (src, dst) = (bodies[s], bodies[t]);
            let mut x = dst.x + dst.vx - src.x - src.vx;
            let mut y = dst.y + dst.vy - src.y - src.vy;
            if x == 0.0 {
                x = Self::jiggle(rng);
            }
            if y == 0.0 {
                y = Self::jiggle(rng);
            }
            let len = (x * x + y * y).sqrt();
            let k = (len - params.link_distance) / len * alpha * params.link_strength;
            x *= k;
            y *= k;
            bodies[t].vx -= x * bias;
            bodies[t].vy -= y * bias;
            bodies[s].vx += x * (1.0 - bias);
            bodies[s].vy += y * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self, alpha: f64) {
        let strength = self.params.charge_strength;
        let n = self.bodies.len();
        for i in 0..n {
            let (xi, yi) = (self.bodies[i].x, self.bodies[i].y);
            let (mut dvx, mut dvy) = (0.0, 0.0);
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut x = self.bodies[j].x - xi;
                let mut y = self.bodies[j].y - yi;
                let mut l = x * x + y * y;
                if x == 0.0 {
                    x = Self::jiggle(&mut self.rng);
                    l += x * x;
                }
                if y == 0.0 {
                    y = Self::jiggle(&mut self.rng);
                    l += y * y;
                }
                // Minimum distance 1 keeps the force finite.
                if l < 1.0 {
                    l = l.sqrt();
                }
                let w = strength * alpha / l;
                dvx += x * w;
                dvy += y * w;
            }
            self.bodies[i].vx += dvx;
            self.bodies[i].vy += dvy;
        }
    }

    fn apply_center(&mut self) {
        let n = self.bodies.len();
        if n == 0 {
            return;
        }
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(ax, ay), b| (ax + b.x, ay + b.y));
        let dx = sx / n as f64 - self.center.0;
        let dy = sy / n as f64 - self.center.1;
        for b in &mut self.bodies {
            b.x -= dx;
            b.y -= dy;
        }
    }

    fn apply_collide(&mut self) {
        let r = self.params.collide_radius;
        let reach = r + r;
        let n = self.bodies.len();
        for i in 0..n {
            let xi = self.bodies[i].x + self.bodies[i].vx;
            let yi = self.bodies[i].y + self.bodies[i].vy;
            for j in (i + 1)..n {
                let other = self.bodies[j];
                let mut x = xi - (other.x + other.vx);
                let mut y = yi - (other.y + other.vy);
                let mut l = x * x + y * y;
                if l >= reach * reach {
                    continue;
                }
                if x == 0.0 {
                    x = Self::jiggle(&mut self.rng);
                    l += x * x;
                }
                if y == 0.0 {
                    y = Self::jiggle(&mut self.rng);
                    l += y * y;
                }
                l = l.sqrt();
                let k = (reach - l) / l;
                x *= k;
                y *= k;
                // Equal radii: each side takes half the correction.
                self.bodies[i].vx += x * 0.5;
                self.bodies[i].vy += y * 0.5;
                self.bodies[j].vx -= x * 0.5;
                self.bodies[j].vy -= y * 0.5;
            }
        }
    }
}
