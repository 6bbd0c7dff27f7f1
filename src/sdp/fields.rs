//! Signaling fields pulled out of a local session description.

/// Fields the signaling backend needs from our offer.
///
/// Every field is optional; a missing line is not an error here. The
/// negotiator decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdpFields {
    pub ufrag: Option<String>,
    pub pwd: Option<String>,
    /// Fingerprint hash algorithm, e.g. `sha-256`
    pub hash: Option<String>,
    /// Fingerprint value
    pub fingerprint: Option<String>,
    /// DTLS setup role
    pub setup: Option<String>,
    /// First media source id (`a=ssrc:`)
    pub source: Option<u32>,
    /// FID source group (`a=ssrc-group:FID`)
    pub source_group: Option<Vec<u32>>,
}

const FINGERPRINT: &str = "a=fingerprint:";
const SETUP: &str = "a=setup:";
const ICE_PWD: &str = "a=ice-pwd:";
const ICE_UFRAG: &str = "a=ice-ufrag:";
const SSRC: &str = "a=ssrc:";
const SSRC_GROUP_FID: &str = "a=ssrc-group:FID ";

/// Suffix of the first line starting with `prefix`.
fn lookup<'a>(sdp: &'a str, prefix: &str) -> Option<&'a str> {
    sdp.lines().find_map(|line| line.strip_prefix(prefix))
}

/// Extract the signaling fields from SDP text.
///
/// Accepts CRLF or LF line endings.
pub fn parse_sdp(sdp: &str) -> SdpFields {
    let mut fingerprint = lookup(sdp, FINGERPRINT).map(|v| v.split(' '));
    let hash = fingerprint.as_mut().and_then(|parts| parts.next()).map(str::to_owned);
    let fingerprint = fingerprint.as_mut().and_then(|parts| parts.next()).map(str::to_owned);

    let source = lookup(sdp, SSRC)
        .and_then(|v| v.split(' ').next())
        .and_then(|id| id.parse::<u32>().ok());

    let source_group = lookup(sdp, SSRC_GROUP_FID).map(|v| {
        v.split(' ')
            .filter_map(|id| id.parse::<u32>().ok())
            .collect::<Vec<_>>()
    });

    SdpFields {
        ufrag: lookup(sdp, ICE_UFRAG).map(str::to_owned),
        pwd: lookup(sdp, ICE_PWD).map(str::to_owned),
        hash,
        fingerprint,
        setup: lookup(sdp, SETUP).map(str::to_owned),
        source,
        source_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
        a=ice-ufrag:F7gI\r\n\
        a=ice-pwd:x9cml/YzichV2+XlhiMu8g\r\n\
        a=fingerprint:sha-256 D1:2C:BE:AD:C4:F6:64:5C\r\n\
        a=setup:actpass\r\n\
        a=mid:0\r\n\
        a=ssrc-group:FID 2231627014 632943048\r\n\
        a=ssrc:2231627014 cname:4TOk42mSjXCkVIa6\r\n\
        a=ssrc:2231627014 msid:stream audio\r\n\
        a=ice-ufrag:second\r\n";

    #[test]
    fn test_parses_all_fields() {
        let fields = parse_sdp(OFFER);
        assert_eq!(fields.ufrag.as_deref(), Some("F7gI"));
        assert_eq!(fields.pwd.as_deref(), Some("x9cml/YzichV2+XlhiMu8g"));
        assert_eq!(fields.hash.as_deref(), Some("sha-256"));
        assert_eq!(fields.fingerprint.as_deref(), Some("D1:2C:BE:AD:C4:F6:64:5C"));
        assert_eq!(fields.setup.as_deref(), Some("actpass"));
        assert_eq!(fields.source, Some(2231627014));
        assert_eq!(fields.source_group, Some(vec![2231627014, 632943048]));
    }

    #[test]
    fn test_missing_pwd_is_absent() {
        let sdp = OFFER.replace("a=ice-pwd:x9cml/YzichV2+XlhiMu8g\r\n", "");
        let fields = parse_sdp(&sdp);
        assert_eq!(fields.pwd, None);
        assert_eq!(fields.ufrag.as_deref(), Some("F7gI"));
        assert_eq!(fields.hash.as_deref(), Some("sha-256"));
        assert_eq!(fields.source, Some(2231627014));
    }

    #[test]
    fn test_first_match_wins_and_lf_accepted() {
        let fields = parse_sdp(&OFFER.replace("\r\n", "\n"));
        assert_eq!(fields.ufrag.as_deref(), Some("F7gI"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_sdp(""), SdpFields::default());
    }

    #[test]
    fn test_fingerprint_without_value() {
        let fields = parse_sdp("a=fingerprint:sha-256\r\n");
        assert_eq!(fields.hash.as_deref(), Some("sha-256"));
        assert_eq!(fields.fingerprint, None);
    }
}
