/// Gaussian plume dispersion math.
///
/// Ground-level centerline concentration from an elevated source:
///
/// ```text
/// C(x) = (Q / (pi * u * sigma_y * sigma_z)) * exp(-H^2 / (2 sigma_z^2)) * 1e6   [ug/m3]
/// ```
///
/// The pi (not 2*pi) denominator carries the ground-reflection factor of 2
/// implicitly. Sigma curves are the Briggs-rural power-law fits with
/// class-dependent coefficients; x is taken in kilometers inside the fits.
use crate::domain::StabilityClass;

/// Wind floor in m/s; keeps the 1/u term bounded in near-calm conditions.
pub const MIN_WIND_MPS: f64 = 0.5;

/// sigma_z is capped here; the power-law fits are extrapolated beyond their
/// calibration range at long distances under unstable classes.
const SIGMA_Z_CAP_M: f64 = 5000.0;

/// Returned for non-positive distances.
const SIGMA_EPSILON_M: f64 = 0.1;

pub const MPH_TO_MPS: f64 = 0.44704;

/// Crosswind spread coefficient `a` in sigma_y = a * x_km^0.894, per class.
const SIGMA_Y_COEF: [f64; 6] = [213.0, 156.0, 104.0, 68.0, 50.5, 34.0];

const SIGMA_Y_EXP: f64 = 0.894;

/// Vertical spread (b, c) in sigma_z = b * x_km^c, per class.
const SIGMA_Z_COEF: [(f64, f64); 6] = [
    (440.8, 1.941),
    (106.6, 1.149),
    (61.0, 0.911),
    (33.2, 0.725),
    (22.8, 0.678),
    (14.35, 0.740),
];

pub fn sigma_y(class: StabilityClass, distance_m: f64) -> f64 {
    if distance_m <= 0.0 {
        return SIGMA_EPSILON_M;
    }
    let x_km = distance_m / 1000.0;
    SIGMA_Y_COEF[class.index()] * x_km.powf(SIGMA_Y_EXP)
}

pub fn sigma_z(class: StabilityClass, distance_m: f64) -> f64 {
    if distance_m <= 0.0 {
        return SIGMA_EPSILON_M;
    }
    let x_km = distance_m / 1000.0;
    let (b, c) = SIGMA_Z_COEF[class.index()];
    (b * x_km.powf(c)).min(SIGMA_Z_CAP_M)
}

/// Ground-level centerline concentration in ug/m3.
pub fn centerline_concentration(
    emission_rate_g_s: f64,
    wind_mps: f64,
    effective_height_m: f64,
    sigma_y_m: f64,
    sigma_z_m: f64,
) -> f64 {
    let u = wind_mps.max(MIN_WIND_MPS);
    let dilution = std::f64::consts::PI * u * sigma_y_m * sigma_z_m;
    let vertical = (-effective_height_m * effective_height_m / (2.0 * sigma_z_m * sigma_z_m)).exp();
    emission_rate_g_s / dilution * vertical * 1e6
}

// ============================================================================
// PLUME RISE
// ============================================================================

/// Lower heating value of dry crop residue, J/kg.
const FUEL_HEATING_VALUE_J_PER_KG: f64 = 15.0e6;

/// Fraction of the field's total heat release that drives plume buoyancy at
/// any moment: only the active flaming front lofts smoke.
const EFFECTIVE_CONVECTIVE_FRACTION: f64 = 0.005;

/// Effective plume heights are capped; field burns do not penetrate the
/// mixing layer.
const MAX_PLUME_RISE_M: f64 = 300.0;

/// Briggs final plume rise for a buoyant release, m.
///
/// `fuel_burn_rate_kg_s` is total dry fuel consumed per second over the
/// whole field; the convective fraction scales it down to the flaming front.
pub fn plume_rise(fuel_burn_rate_kg_s: f64, wind_mps: f64) -> f64 {
    let u = wind_mps.max(MIN_WIND_MPS);
    let q_conv_w = fuel_burn_rate_kg_s * FUEL_HEATING_VALUE_J_PER_KG * EFFECTIVE_CONVECTIVE_FRACTION;
    // Buoyancy flux from convective heat release.
    let f = 8.8e-6 * q_conv_w;
    if f <= 0.0 {
        return 0.0;
    }
    let rise = if f < 55.0 {
        21.425 * f.powf(0.75) / u
    } else {
        38.71 * f.powf(0.6) / u
    };
    rise.min(MAX_PLUME_RISE_M)
}
