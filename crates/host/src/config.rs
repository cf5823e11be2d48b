//! Simulation configuration loader.
//!
//! Parses an INI-style file of controller overrides. Every key is
//! optional; keys that are absent keep their reference defaults from
//! [`MpcParams::default`]. Angles are configured in degrees.

use anyhow::{anyhow, ensure, Context, Result};
use configparser::ini::Ini;
use control::MpcParams;
use std::path::Path;

/// Loads parameter overrides from the given INI file.
pub fn load_params(path: &Path) -> Result<MpcParams> {
    let mut ini = Ini::new();
    ini.load(path)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("failed to load configuration file {:?}", path))?;

    let mut params = MpcParams::default();

    override_usize(&ini, "mpc", "horizon", &mut params.horizon)?;
    override_float(&ini, "mpc", "dt", &mut params.dt)?;
    override_usize(&ini, "mpc", "max_iter", &mut params.max_iter)?;
    override_float(&ini, "mpc", "du_th", &mut params.du_th)?;
    override_weights(&ini, "mpc", "q", &mut params.q)?;
    override_weights(&ini, "mpc", "qf", &mut params.qf)?;
    override_weights(&ini, "mpc", "r", &mut params.r)?;
    override_weights(&ini, "mpc", "rd", &mut params.rd)?;

    override_float(&ini, "course", "dl", &mut params.dl)?;
    override_float(&ini, "course", "target_speed", &mut params.target_speed)?;
    override_usize(&ini, "course", "n_ind_search", &mut params.n_ind_search)?;

    override_float(&ini, "vehicle", "wheelbase", &mut params.wheelbase)?;
    override_float(&ini, "vehicle", "max_speed", &mut params.max_speed)?;
    override_float(&ini, "vehicle", "min_speed", &mut params.min_speed)?;
    override_float(&ini, "vehicle", "max_accel", &mut params.max_accel)?;
    override_angle(&ini, "vehicle", "max_steer_deg", &mut params.max_steer)?;
    override_angle(&ini, "vehicle", "max_dsteer_deg", &mut params.max_dsteer)?;

    override_float(&ini, "goal", "goal_dis", &mut params.goal_dis)?;
    override_float(&ini, "goal", "stop_speed", &mut params.stop_speed)?;
    override_float(&ini, "goal", "xy_goal_tolerance", &mut params.xy_goal_tolerance)?;

    override_float(&ini, "simulation", "max_time", &mut params.max_time)?;
    override_bool(
        &ini,
        "simulation",
        "obstacle_avoidance",
        &mut params.obstacle_avoidance,
    )?;

    Ok(params)
}

fn override_float(ini: &Ini, section: &str, key: &str, target: &mut f64) -> Result<()> {
    if let Some(value) = ini
        .getfloat(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
    {
        *target = value;
    }
    Ok(())
}

fn override_angle(ini: &Ini, section: &str, key: &str, target: &mut f64) -> Result<()> {
    if let Some(degrees) = ini
        .getfloat(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
    {
        *target = degrees.to_radians();
    }
    Ok(())
}

fn override_usize(ini: &Ini, section: &str, key: &str, target: &mut usize) -> Result<()> {
    if let Some(value) = ini
        .getuint(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
    {
        *target = value as usize;
    }
    Ok(())
}

fn override_bool(ini: &Ini, section: &str, key: &str, target: &mut bool) -> Result<()> {
    if let Some(value) = ini
        .getbool(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
    {
        *target = value;
    }
    Ok(())
}

fn override_weights<const N: usize>(
    ini: &Ini,
    section: &str,
    key: &str,
    target: &mut [f64; N],
) -> Result<()> {
    if let Some(raw) = ini.get(section, key) {
        let parsed: Vec<f64> = raw
            .split(',')
            .map(|part| part.trim().parse())
            .collect::<Result<_, _>>()
            .with_context(|| format!("[{section}] {key}: expected comma-separated floats"))?;
        ensure!(
            parsed.len() == N,
            "[{section}] {key}: expected {N} values, got {}",
            parsed.len()
        );
        target.copy_from_slice(&parsed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "fleet-host-config-{}-{}.ini",
            std::process::id(),
            content.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn absent_keys_keep_the_defaults() {
        let path = write_config("[mpc]\nhorizon = 8\n");
        let params = load_params(&path).unwrap();
        assert_eq!(params.horizon, 8);
        assert_eq!(params.dt, MpcParams::default().dt);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn weights_and_angles_parse() {
        let path = write_config(
            "[mpc]\nq = 2, 2, 1, 2\n[vehicle]\nmax_steer_deg = 30\n[simulation]\nobstacle_avoidance = false\n",
        );
        let params = load_params(&path).unwrap();
        assert_eq!(params.q, [2.0, 2.0, 1.0, 2.0]);
        assert!((params.max_steer - 30f64.to_radians()).abs() < 1e-12);
        assert!(!params.obstacle_avoidance);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn malformed_weight_lists_are_rejected() {
        let path = write_config("[mpc]\nq = 1, 2\n");
        assert!(load_params(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}
