/// Fuel-load and emission-factor tables, keyed by crop.
///
/// Total PM2.5 comes from acreage x dry-fuel load x emission factor; the
/// burn duration scales with acreage inside the [2 h, 8 h] operating clamp,
/// and the emission rate spreads the total over that duration.
use crate::domain::{CropType, ValidationError};

/// kg of PM2.5 emitted per tonne of dry fuel.
pub fn emission_factor_kg_per_tonne(crop: CropType) -> f64 {
    match crop {
        CropType::Rice => 3.2,
        CropType::Wheat => 2.8,
        CropType::Corn => 2.1,
        CropType::Barley => 2.5,
        CropType::Oats => 2.3,
        CropType::Cotton => 4.1,
        CropType::Soybeans => 1.9,
        CropType::Sunflower => 2.2,
        CropType::Sorghum => 3.0,
        CropType::Other => 2.5,
    }
}

/// Tonnes of dry residue per acre left standing after harvest.
pub fn fuel_load_tonnes_per_acre(crop: CropType) -> f64 {
    match crop {
        CropType::Rice => 4.0,
        CropType::Wheat => 3.35,
        CropType::Corn => 4.25,
        CropType::Barley => 3.1,
        CropType::Oats => 2.9,
        CropType::Cotton => 2.8,
        CropType::Soybeans => 2.6,
        CropType::Sunflower => 2.7,
        CropType::Sorghum => 3.6,
        CropType::Other => 3.0,
    }
}

/// Acres burned per hour by a typical crew; sets duration before clamping.
const ACRES_PER_HOUR: f64 = 50.0;

const MIN_DURATION_HOURS: f64 = 2.0;
const MAX_DURATION_HOURS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionProfile {
    /// g/s of PM2.5 while the burn is active.
    pub emission_rate_g_s: f64,
    /// Total PM2.5 over the whole burn, kg.
    pub total_emissions_kg: f64,
    /// Total dry fuel consumed, kg.
    pub total_fuel_kg: f64,
    pub duration_hours: f64,
}

pub fn emission_profile(acres: f64, crop: CropType) -> Result<EmissionProfile, ValidationError> {
    if !acres.is_finite() || acres <= 0.0 {
        return Err(ValidationError::InvalidAcreage(acres));
    }

    let fuel_tonnes = acres * fuel_load_tonnes_per_acre(crop);
    let total_emissions_kg = fuel_tonnes * emission_factor_kg_per_tonne(crop);
    let duration_hours = (acres / ACRES_PER_HOUR).clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS);
    let emission_rate_g_s = total_emissions_kg * 1000.0 / (duration_hours * 3600.0);

    Ok(EmissionProfile {
        emission_rate_g_s,
        total_emissions_kg,
        total_fuel_kg: fuel_tonnes * 1000.0,
        duration_hours,
    })
}
