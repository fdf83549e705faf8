use chrono::{DateTime, NaiveDate, Utc};
use geo::{Area, Centroid, Coord, HaversineDistance, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::errors::ValidationError;

// ============================================================================
// CROPS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    Rice,
    Wheat,
    Corn,
    Barley,
    Oats,
    Cotton,
    Soybeans,
    Sunflower,
    Sorghum,
    Other,
}

impl CropType {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "rice" => Ok(Self::Rice),
            "wheat" => Ok(Self::Wheat),
            "corn" => Ok(Self::Corn),
            "barley" => Ok(Self::Barley),
            "oats" => Ok(Self::Oats),
            "cotton" => Ok(Self::Cotton),
            "soybeans" => Ok(Self::Soybeans),
            "sunflower" => Ok(Self::Sunflower),
            "sorghum" => Ok(Self::Sorghum),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownCrop(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rice => "rice",
            Self::Wheat => "wheat",
            Self::Corn => "corn",
            Self::Barley => "barley",
            Self::Oats => "oats",
            Self::Cotton => "cotton",
            Self::Soybeans => "soybeans",
            Self::Sunflower => "sunflower",
            Self::Sorghum => "sorghum",
            Self::Other => "other",
        }
    }

    pub fn all() -> [CropType; 10] {
        [
            Self::Rice,
            Self::Wheat,
            Self::Corn,
            Self::Barley,
            Self::Oats,
            Self::Cotton,
            Self::Soybeans,
            Self::Sunflower,
            Self::Sorghum,
            Self::Other,
        ]
    }
}

impl std::fmt::Display for CropType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        a.haversine_distance(&b)
    }

    /// Cache key: (lat, lon) rounded to 3 decimals (~100 m).
    pub fn rounded_key(&self) -> (i64, i64) {
        (
            (self.lat * 1000.0).round() as i64,
            (self.lon * 1000.0).round() as i64,
        )
    }
}

/// A closed field boundary polygon on WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoundary {
    pub points: Vec<GeoPoint>,
}

impl FieldBoundary {
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }

    fn to_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|p| Coord { x: p.lon, y: p.lat })
            .collect();
        Polygon::new(LineString::from(coords), vec![])
    }

    /// Planar area in squared degrees. Only used to reject degenerate
    /// polygons; acreage comes from the request itself.
    pub fn planar_area(&self) -> f64 {
        self.to_polygon().unsigned_area()
    }

    /// Polygon centroid, or None when the ring is degenerate.
    pub fn centroid(&self) -> Option<GeoPoint> {
        self.to_polygon()
            .centroid()
            .map(|c| GeoPoint::new(c.y(), c.x()))
    }
}

// ============================================================================
// TIME WINDOWS & SLOTS
// ============================================================================

/// Granularity of request time windows and schedule slots.
pub const SLOT_MINUTES: u32 = 30;

/// Minimum burn duration in minutes (2 hours).
pub const MIN_BURN_DURATION_MIN: u32 = 120;

/// Maximum burn duration in minutes (8 hours).
pub const MAX_BURN_DURATION_MIN: u32 = 480;

/// A [start, end) window in minutes since local midnight, both on the
/// 30-minute grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_min: u32,
    pub end_min: u32,
}

impl TimeWindow {
    pub fn new(start_min: u32, end_min: u32) -> Self {
        Self { start_min, end_min }
    }

    /// Parse "HH:MM" into minutes since midnight.
    pub fn parse_hhmm(s: &str) -> Option<u32> {
        let (h, m) = s.split_once(':')?;
        let h: u32 = h.parse().ok()?;
        let m: u32 = m.parse().ok()?;
        if h < 24 && m < 60 {
            Some(h * 60 + m)
        } else {
            None
        }
    }

    /// Format minutes since midnight as "HH:MM" (the persisted shape).
    pub fn format_hhmm(minutes: u32) -> String {
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }

    pub fn duration_min(&self) -> u32 {
        self.end_min.saturating_sub(self.start_min)
    }

    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        other.start_min >= self.start_min && other.end_min <= self.end_min
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            Self::format_hhmm(self.start_min),
            Self::format_hhmm(self.end_min)
        )
    }
}

// ============================================================================
// BURN REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRequest {
    pub id: u64,
    pub farm_id: u64,
    pub field_boundary: FieldBoundary,
    pub acres: f64,
    pub crop_type: CropType,
    pub burn_date: NaiveDate,
    pub time_window: TimeWindow,
    #[serde(default)]
    pub priority_hint: Option<u8>,
}

/// Historical per-farm success features feeding burn vector dims 23-31.
/// Absent history leaves those dims zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BurnHistory {
    pub success_rate: f64,
    pub avg_duration_hours: f64,
    pub conflict_rate: f64,
    pub good_weather_rate: f64,
    pub on_time_rate: f64,
    pub experience: f64,
    pub no_violation_rate: f64,
    pub recent_success: f64,
    pub seasonal_success: f64,
}

/// A burn request that passed validation. Immutable for the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRequest {
    pub request: BurnRequest,
    /// Priority score, 0-100.
    pub priority: u8,
    /// 32-dim unit-normalized burn feature vector.
    pub feature_vector: Vec<f64>,
    /// Field centroid; the regional fallback when the polygon is degenerate.
    pub centroid: GeoPoint,
    /// Set when the centroid fell back or a prediction invariant tripped.
    pub low_confidence: bool,
}

// ============================================================================
// WEATHER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherReliability {
    Normal,
    /// Served from a stale cache entry after a provider failure.
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub location: GeoPoint,
    pub observation_time: DateTime<Utc>,
    pub temperature_f: f64,
    pub humidity_pct: f64,
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    pub pressure_in_hg: f64,
    pub cloud_cover_pct: f64,
    pub precipitation_prob_pct: f64,
    pub visibility_mi: f64,
    #[serde(default = "WeatherSample::default_reliability")]
    pub reliability: WeatherReliability,
}

impl WeatherSample {
    fn default_reliability() -> WeatherReliability {
        WeatherReliability::Normal
    }
}

/// Suitability of a weather sample for burning, in [0, 1].
pub type SuitabilityScore = f64;

/// A maximal run of suitable 3-hourly forecast slots (>= 6 hours).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Output of the weather analyzer for one location/date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAnalysis {
    pub current: WeatherSample,
    pub forecast: Vec<WeatherSample>,
    pub suitability: SuitabilityScore,
    pub burn_windows: Vec<BurnWindow>,
    /// 128-dim deterministic weather embedding of the current sample.
    pub embedding: Vec<f64>,
}

// ============================================================================
// PREDICTIONS
// ============================================================================

/// Pasquill-Gifford atmospheric stability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StabilityClass {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl StabilityClass {
    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
            Self::F => 5,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
        }
    }
}

/// One downwind centerline sample of the concentration field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationSample {
    pub distance_m: f64,
    pub centerline_pm25_ug_m3: f64,
    pub sigma_y: f64,
    pub sigma_z: f64,
    /// EPA daily threshold, 35 ug/m3.
    pub exceeds_daily: bool,
    /// Unhealthy threshold, 55 ug/m3.
    pub exceeds_unhealthy: bool,
    /// Hazardous threshold, 250 ug/m3.
    pub exceeds_hazardous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Spatial,
    Temporal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    /// Stored literal ("low" | "medium" | "high").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Weight used by the optimizer's smoke-conflict term.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 1.0 / 3.0,
            Self::Medium => 2.0 / 3.0,
            Self::High => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub other_burn_request_id: u64,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub burn_request_id: u64,
    /// PM2.5 emission rate in g/s.
    pub emission_rate: f64,
    /// Total PM2.5 emissions in kg.
    pub total_emissions: f64,
    /// Burn duration in hours, clamped to [2, 8].
    pub burn_duration_hours: f64,
    pub stability_class: StabilityClass,
    pub concentration_field: Vec<ConcentrationSample>,
    /// Largest downwind distance where the centerline exceeds the EPA annual
    /// threshold (12 ug/m3).
    pub max_radius_m: f64,
    pub affected_area_km2: f64,
    /// 64-dim unit-normalized plume feature vector.
    pub plume_vector: Vec<f64>,
    pub conflicts: Vec<Conflict>,
    pub confidence: f64,
    pub low_confidence: bool,
}

// ============================================================================
// SCHEDULES
// ============================================================================

/// Hard cap on burns occupying any single slot.
pub const MAX_DAILY_BURNS_PER_SLOT: usize = 50;

/// A slot assignment: [start_slot, end_slot) on the operating-day grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub start_slot: usize,
    pub end_slot: usize,
}

impl Assignment {
    pub fn slots(&self) -> std::ops::Range<usize> {
        self.start_slot..self.end_slot
    }

    pub fn overlaps(&self, other: &Assignment) -> bool {
        self.start_slot < other.end_slot && other.start_slot < self.end_slot
    }
}

/// A day's schedule: a partial map from request id to assignment plus the
/// unscheduled set with reasons. Assignments hold request ids only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub assignments: BTreeMap<u64, Assignment>,
    pub unscheduled: BTreeMap<u64, String>,
}

impl Schedule {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            assignments: BTreeMap::new(),
            unscheduled: BTreeMap::new(),
        }
    }

    /// Derived view: request ids occupying each slot.
    pub fn slot_occupancy(&self, slot_count: usize) -> Vec<BTreeSet<u64>> {
        let mut occupancy = vec![BTreeSet::new(); slot_count];
        for (id, assignment) in &self.assignments {
            for slot in assignment.slots() {
                if slot < slot_count {
                    occupancy[slot].insert(*id);
                }
            }
        }
        occupancy
    }

    /// Occupancy with a one-hour buffer on each side of every assignment.
    /// Accounting-only: the buffer is not a scheduling constraint.
    pub fn buffered_occupancy(&self, slot_count: usize) -> Vec<BTreeSet<u64>> {
        const BUFFER_SLOTS: usize = 2;
        let mut occupancy = vec![BTreeSet::new(); slot_count];
        for (id, assignment) in &self.assignments {
            let start = assignment.start_slot.saturating_sub(BUFFER_SLOTS);
            let end = (assignment.end_slot + BUFFER_SLOTS).min(slot_count);
            for slot in start..end {
                occupancy[slot].insert(*id);
            }
        }
        occupancy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub smoke_conflicts: f64,
    pub time_window: f64,
    pub weather: f64,
    pub priority: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImprovementPoint {
    pub iteration: u64,
    pub score: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub overall_score: f64,
    pub scheduled_count: usize,
    pub unscheduled_count: usize,
    pub avg_conflict_score: f64,
    pub time_window_compliance: f64,
    pub iterations: u64,
    pub reheats: u32,
    pub final_temperature: f64,
    pub improvement_history: Vec<ImprovementPoint>,
    pub breakdown: ScoreBreakdown,
}

// ============================================================================
// ALERTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Sms,
    Voice,
    Email,
    Push,
}

impl AlertChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Voice => "voice",
            Self::Email => "email",
            Self::Push => "push",
        }
    }

    /// Substitute channel when the primary is unavailable.
    pub fn fallback(&self) -> AlertChannel {
        match self {
            Self::Sms => Self::Voice,
            Self::Email => Self::Push,
            Self::Voice => Self::Push,
            Self::Push => Self::Sms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub recipient_id: u64,
    pub channel: AlertChannel,
    pub priority: AlertPriority,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// Client-supplied idempotency key; repeats within the dedup TTL produce
    /// no additional delivery.
    pub dedup_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedAlert {
    pub alert: Alert,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Set on rate-limited drops.
    pub next_allowed_time: Option<DateTime<Utc>>,
    /// The channel actually used (after fallback substitution).
    pub channel_used: AlertChannel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: u64,
    pub preferred_channel: AlertChannel,
}

/// Channel availability as observed by the caller.
pub type ChannelStates = HashMap<AlertChannel, bool>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: Vec<DispatchedAlert>,
    pub dropped: Vec<DispatchedAlert>,
    pub failed: Vec<DispatchedAlert>,
    /// Deferred under overload; still pending.
    pub deferred: Vec<Alert>,
    /// Suppressed by an already-seen dedup key inside the TTL.
    pub deduped: Vec<Alert>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn square_boundary() -> FieldBoundary {
        FieldBoundary {
            points: vec![
                GeoPoint::new(38.50, -121.50),
                GeoPoint::new(38.51, -121.50),
                GeoPoint::new(38.51, -121.49),
                GeoPoint::new(38.50, -121.49),
                GeoPoint::new(38.50, -121.50),
            ],
        }
    }

    #[test]
    fn test_time_window_parse_and_format() {
        assert_eq!(TimeWindow::parse_hhmm("09:00"), Some(540));
        assert_eq!(TimeWindow::parse_hhmm("23:30"), Some(1410));
        assert_eq!(TimeWindow::parse_hhmm("24:00"), None);
        assert_eq!(TimeWindow::format_hhmm(540), "09:00");
        assert_eq!(TimeWindow::format_hhmm(1410), "23:30");
    }

    #[test]
    fn test_time_window_intersects() {
        let a = TimeWindow::new(540, 780); // 09:00-13:00
        let b = TimeWindow::new(720, 900); // 12:00-15:00
        let c = TimeWindow::new(780, 900); // 13:00-15:00
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_boundary_closed_and_centroid() {
        let boundary = square_boundary();
        assert!(boundary.is_closed());
        assert!(boundary.planar_area() > 0.0);

        let centroid = boundary.centroid().unwrap();
        assert!((centroid.lat - 38.505).abs() < 1e-6);
        assert!((centroid.lon - -121.495).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_boundary_has_no_area() {
        let line = FieldBoundary {
            points: vec![
                GeoPoint::new(38.5, -121.5),
                GeoPoint::new(38.6, -121.5),
                GeoPoint::new(38.7, -121.5),
                GeoPoint::new(38.5, -121.5),
            ],
        };
        assert!(line.planar_area() < 1e-12);
    }

    #[test]
    fn test_distance_between_close_points() {
        let a = GeoPoint::new(38.5, -121.5);
        let b = GeoPoint::new(38.5045, -121.5); // ~500 m north
        let d = a.distance_m(&b);
        assert!((400.0..600.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_slot_occupancy_derivation() {
        let mut schedule = Schedule::empty(NaiveDate::from_ymd_opt(2025, 9, 15).unwrap());
        schedule.assignments.insert(
            1,
            Assignment {
                start_slot: 2,
                end_slot: 4,
            },
        );
        schedule.assignments.insert(
            2,
            Assignment {
                start_slot: 3,
                end_slot: 5,
            },
        );

        let occupancy = schedule.slot_occupancy(29);
        assert!(occupancy[2].contains(&1));
        assert!(occupancy[3].contains(&1));
        assert!(occupancy[3].contains(&2));
        assert!(occupancy[5].is_empty());
    }

    #[test]
    fn test_buffered_occupancy_extends_one_hour() {
        let mut schedule = Schedule::empty(NaiveDate::from_ymd_opt(2025, 9, 15).unwrap());
        schedule.assignments.insert(
            1,
            Assignment {
                start_slot: 4,
                end_slot: 8,
            },
        );

        let buffered = schedule.buffered_occupancy(29);
        assert!(buffered[2].contains(&1));
        assert!(buffered[9].contains(&1));
        assert!(buffered[1].is_empty());
        assert!(buffered[10].is_empty());

        // Buffer clamps at the grid edges.
        schedule.assignments.insert(
            2,
            Assignment {
                start_slot: 0,
                end_slot: 4,
            },
        );
        let buffered = schedule.buffered_occupancy(29);
        assert!(buffered[0].contains(&2));
    }

    #[test]
    fn test_channel_fallback_map() {
        assert_eq!(AlertChannel::Sms.fallback(), AlertChannel::Voice);
        assert_eq!(AlertChannel::Email.fallback(), AlertChannel::Push);
        assert_eq!(AlertChannel::Voice.fallback(), AlertChannel::Push);
        assert_eq!(AlertChannel::Push.fallback(), AlertChannel::Sms);
    }

    #[test]
    fn test_severity_ordering_and_literals() {
        assert!(ConflictSeverity::High > ConflictSeverity::Medium);
        assert!(ConflictSeverity::Medium > ConflictSeverity::Low);
        assert_eq!(ConflictSeverity::High.as_str(), "high");
        assert_eq!(
            serde_json::to_string(&ConflictSeverity::Medium).unwrap(),
            "\"medium\""
        );
    }
}
