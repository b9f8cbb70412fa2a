use std::path::Path;

use mixdeck_core::{
    TrackRole, detect_role,
    roles::detect_stem_role,
};

#[test]
fn file_names_map_to_roles() {
    assert_eq!(detect_role("lead_vocal.wav"), TrackRole::LeadVocal);
    assert_eq!(detect_role("adlib_2.wav"), TrackRole::Adlib);
    assert_eq!(detect_role("full_beat.wav"), TrackRole::Instrumental);
    assert_eq!(detect_role("track3.wav"), TrackRole::Unknown);
}

#[test]
fn detection_is_case_insensitive_and_ordered() {
    assert_eq!(detect_role("MAIN_VOX.WAV"), TrackRole::LeadVocal);
    assert_eq!(detect_role("lead_double.wav"), TrackRole::LeadVocal);
    assert_eq!(detect_role("Double_Harmony.flac"), TrackRole::Double);
    assert_eq!(detect_role("harmony_adlib.wav"), TrackRole::Harmony);
    assert_eq!(detect_role("instrumental.mp3"), TrackRole::Instrumental);
    assert_eq!(detect_role("808_bass.wav"), TrackRole::Bass);
    assert_eq!(detect_role("beat_with_bass.wav"), TrackRole::Instrumental);
}

#[test]
fn file_name_wins_then_stem_name_is_consulted() {
    assert_eq!(
        detect_stem_role("beat", Path::new("/uploads/lead_vocal.wav")),
        TrackRole::LeadVocal
    );
    assert_eq!(
        detect_stem_role("lead", Path::new("/tmp/take_07.wav")),
        TrackRole::LeadVocal
    );
    assert_eq!(
        detect_stem_role("stem_1", Path::new("/tmp/adlibs_final.wav")),
        TrackRole::Adlib
    );
    assert_eq!(
        detect_stem_role("stem_2", Path::new("/tmp/take.wav")),
        TrackRole::Unknown
    );
}

#[test]
fn every_role_has_a_preset_and_targets() {
    for role in TrackRole::ALL {
        let preset = role.preset();
        assert_eq!(preset.role, role);
        let targets = role.level_targets();
        assert!(targets.lufs < 0.0);
        assert!(targets.rms > 0.0);
    }
}
