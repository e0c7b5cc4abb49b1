//! Event-code to color mapping used to paint alert features.

/// Color used for unknown codes and for features that don't carry one.
pub const DEFAULT_COLOR: &str = "#EFEFEF";

/// Fill color of an NWS three-letter event code.
///
/// Unknown codes (and codes deliberately left neutral, such as `HLS`) map to
/// [`DEFAULT_COLOR`].
pub fn color_for(nws_code: &str) -> &'static str {
    match nws_code {
        "ADR" | "LAE" | "LEW" | "TOE" => "#C0C0C0",
        "AVA" => "#F4A460",
        "AVW" => "#1E90FF",
        "BLU" | "CAE" => "#FFFFFF",
        "BZW" => "#FF4500",
        "CDW" | "CEM" => "#FFB6C1",
        "CFA" | "LSA" => "#66CDAA",
        "CFW" | "LSW" | "SUW" => "#228B22",
        "DSW" | "DUW" => "#FFE4C4",
        "EQW" => "#8B4513",
        "EWW" => "#FF8C00",
        "FFA" | "FAA" | "FLA" => "#2E8B57",
        "FFW" => "#8B0000",
        "FAW" | "FLW" => "#00FF00",
        "FRW" => "#A0522D",
        "HMW" | "NUW" | "RHW" => "#4B0082",
        "HUA" | "TYA" | "TSA" => "#FF00FF",
        "HUW" | "TYW" => "#DC143C",
        "HWA" => "#B8860B",
        "HWW" => "#DAA520",
        "AQA" | "ASY" => "#808080",
        "AFY" | "MHY" => "#696969",
        "MHW" => "#A9A9A9",
        "SAB" => "#CD853F",
        "BHS" | "RPS" => "#40E0D0",
        "DUY" | "DSY" => "#BDB76B",
        "BWY" | "SEW" | "SCY" => "#D8BFD8",
        "CFY" | "LSY" => "#7CFC00",
        "CFS" | "LSS" => "#6B8E23",
        "CWY" => "#AFEEEE",
        "FGY" | "MFY" => "#708090",
        "MSY" | "SMY" => "#F0E68C",
        "ECA" => "#5F9EA0",
        "ECW" => "#0000FF",
        "RFD" => "#E9967A",
        "XHA" => "#800000",
        "XHW" | "SQW" => "#C71585",
        "FWA" => "#FFDEAD",
        "FAY" | "FLY" => "#00FF7F",
        "FZW" | "SEA" => "#483D8B",
        "FZA" => "#00FFFF",
        "ZFY" => "#008080",
        "ZYY" | "UPY" | "UPW" => "#00BFFF",
        "FRY" => "#6495ED",
        "GLW" => "#DDA0DD",
        "GLA" => "#FFC0CB",
        "HTY" => "#FF7F50",
        "UPA" => "#BC8F8F",
        "SUY" => "#BA55D3",
        "HFW" => "#CD5C5C",
        "HFA" => "#9932CC",
        "ESF" => "#90EE90",
        "LWY" | "WIY" => "#D2B48C",
        "LOY" => "#A52A2A",
        "MWS" => "#FFDAB9",
        "FWW" => "#FF1493",
        "MAW" | "SVW" => "#FFA500",
        "SRW" => "#9400D3",
        "SRA" | "SPS" => "#FFE4B5",
        "TSY" => "#D2691E",
        "WWY" => "#7B68EE",
        "SPW" => "#FA8072",
        "SSA" => "#DB7FF7",
        "SSW" => "#B524F7",
        "SVA" => "#DB7093",
        "TOW" => "#FF0000",
        "TOA" => "#FFFF00",
        "TRA" => "#F08080",
        "TRW" => "#B22222",
        "TSW" => "#FD6347",
        "VOW" => "#2F4F4F",
        "WSA" => "#4682B4",
        "ISW" => "#8B008B",
        "WSW" => "#FF69B4",
        _ => DEFAULT_COLOR,
    }
}
