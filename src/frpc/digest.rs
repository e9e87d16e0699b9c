//! Expected sha256 resolution for release assets.

/// Known-good hashes of published assets, keyed by asset name. Consulted only
/// when the release index omits a digest and builtin digests are enabled.
const BUILTIN_SHA256: &[(&str, &str)] = &[
    ("LoliaFrp_android_arm.tar.gz", "2653b750c04a3f4a5bd4907d872464ecebb9afc417644fc83d18b612bdca7388"),
    ("LoliaFrp_android_arm64.tar.gz", "c78e200cfac0d971d653d8c79b5627055dc56589024829d9cc9ece60379d53e3"),
    ("LoliaFrp_darwin_amd64.tar.gz", "893a55e439dcf1a8e552f8c72042016efbdcf4b26827cb29e69ec3f846724006"),
    ("LoliaFrp_darwin_arm64.tar.gz", "e44e343868c7e79e12031283ca7b98ff05f5c5c81064a3a9d7940f152dde806d"),
    ("LoliaFrp_freebsd_386.tar.gz", "c98ee37417edf21ffbaec8b0f73b16ad0cb76c06706a4211c2a3ef650b7b9e34"),
    ("LoliaFrp_freebsd_amd64.tar.gz", "3cab06182911860a099a27e88bf5065a5a8fd1293479c0568d9277784ace90e9"),
    ("LoliaFrp_freebsd_arm64.tar.gz", "a7fee4a9341bbf280b5db047f3669cb5a2bb8850e0540c9575cf858722db2d75"),
    ("LoliaFrp_linux_386.tar.gz", "83542f512c085a781ddca1dfc390adddbf1e8b0626d997a8f09469ca9adf1a74"),
    ("LoliaFrp_linux_amd64.tar.gz", "8c83ba6041ca867baf6a07e2a91cd47f185dddaa4137cbab7599bf821c9abf79"),
    ("LoliaFrp_linux_arm.tar.gz", "0b62759b8eb6edef1cc49ef9259ef563ecc842adad98547baf28f00996cfd31a"),
    ("LoliaFrp_linux_arm64.tar.gz", "c7e6e9d29bb3fd990d9dbd93d6e5a6a39bf7e3635c0d83df8abcfce40f1c4dde"),
    ("LoliaFrp_openbsd_386.tar.gz", "cb2519739eb0ea5c1827622ee11fee697f8bf3ed12be975eef4601fe2e74291c"),
    ("LoliaFrp_openbsd_amd64.tar.gz", "cfa78fdefbcc10c1630236531721cb9fa0ee1cb2c779a0321c010080dd8689b9"),
    ("LoliaFrp_openbsd_arm64.tar.gz", "f14cc956831e0540f3dcfad2236b457f6d58b8a62445f9bc936c8ab1b298e6bb"),
    ("LoliaFrp_windows_386.zip", "003a3b52fa7f1c505928e99e57d009692484809d0e2fc08e7ffaceff4e587882"),
    ("LoliaFrp_windows_amd64.zip", "84bb6fc4b936e765fb75068dc8cd0158e1a1bdebd0544e6ed6ede4c7f9b0a123"),
    ("LoliaFrp_windows_arm.zip", "40939f133057d328dfad0f7eee5f06fbc59dfe2c3e06041096f49e68d3f475f6"),
];

/// Parse an advertised digest (`sha256:<hex>` or bare hex) into lowercase hex.
///
/// Anything that is not exactly 64 hex characters yields `None`.
#[must_use]
pub fn parse_sha256_digest(raw: &str) -> Option<String> {
    let digest = raw.trim().to_ascii_lowercase();
    let digest = digest.strip_prefix("sha256:").unwrap_or(&digest);
    (digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| digest.to_string())
}

#[must_use]
pub fn builtin_sha256(asset_name: &str) -> Option<&'static str> {
    BUILTIN_SHA256
        .iter()
        .find(|(name, _)| *name == asset_name)
        .map(|(_, hash)| *hash)
}

/// Expected hash for an asset: the advertised digest, else the builtin table.
#[must_use]
pub fn expected_sha256(asset_name: &str, advertised: &str, use_builtin: bool) -> Option<String> {
    parse_sha256_digest(advertised).or_else(|| {
        use_builtin
            .then(|| builtin_sha256(asset_name))
            .flatten()
            .map(str::to_string)
    })
}
