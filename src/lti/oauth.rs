//! OAuth 1.0 request signing (HMAC-SHA1), as required by LTI 1.0 launches.

use hmac::{Hmac, Mac};
use percent_encoding::utf8_percent_encode;
use sha1::Sha1;

use crate::util::UNRESERVED;


pub(crate) const SIGNATURE_METHOD: &str = "HMAC-SHA1";

fn encode(s: &str) -> String {
    utf8_percent_encode(s, UNRESERVED).to_string()
}

/// Builds the signature base string: method, URL and the normalized
/// parameters, each percent-encoded and joined by `&`. `url` must already be
/// normalized and without query.
pub(crate) fn base_string<'a>(
    method: &str,
    url: &str,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut encoded = params.into_iter()
        .filter(|(key, _)| *key != "oauth_signature")
        .map(|(key, value)| (encode(key), encode(value)))
        .collect::<Vec<_>>();
    encoded.sort();

    let normalized = encoded.iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}&{}&{}", method.to_ascii_uppercase(), encode(url), encode(&normalized))
}

/// Computes the base64 encoded HMAC-SHA1 signature over `base_string`.
pub(crate) fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    use base64::Engine as _;

    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(base_string.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}


#[cfg(test)]
mod tests {
    use super::{base_string, sign};

    // Reference example from OAuth Core 1.0, appendix A.5.
    const PARAMS: &[(&str, &str)] = &[
        ("file", "vacation.jpg"),
        ("size", "original"),
        ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
        ("oauth_token", "nnch734d00sl2jdk"),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", "1191242096"),
        ("oauth_nonce", "kllo9940pd9333jh"),
        ("oauth_version", "1.0"),
    ];

    #[test]
    fn reference_base_string() {
        let base = base_string("GET", "http://photos.example.net/photos", PARAMS.iter().copied());
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg\
                %26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh\
                %26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096\
                %26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal",
        );
    }

    #[test]
    fn reference_signature() {
        let base = base_string("GET", "http://photos.example.net/photos", PARAMS.iter().copied());
        assert_eq!(sign(&base, "kd94hf93k423kf44", "pfkkdhi9sl3r4s00"), "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");
    }

    #[test]
    fn existing_signature_is_ignored_and_values_encoded() {
        let base = base_string("post", "https://oc.my-uni.edu/lti", [
            ("oauth_signature", "abc"),
            ("lis_person_name_full", "Ana María"),
            ("custom_tool", "/ltitools/index.html?series=1&x=~y"),
        ]);
        assert_eq!(
            base,
            "POST&https%3A%2F%2Foc.my-uni.edu%2Flti&\
                custom_tool%3D%252Fltitools%252Findex.html%253Fseries%253D1%2526x%253D~y\
                %26lis_person_name_full%3DAna%2520Mar%25C3%25ADa",
        );
    }
}
