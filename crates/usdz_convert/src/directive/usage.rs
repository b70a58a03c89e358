//! Usage banner and help text.

use crate::TOOL_VERSION;

/// `usdzconvert <version>`
pub fn name_and_version() -> String {
    format!("usdzconvert {}", TOOL_VERSION)
}

/// Short usage banner.
pub fn usage_text() -> String {
    format!(
        "{}\n{}",
        name_and_version(),
        r#"usage: usdzconvert inputFile [outputFile]
                   [-h] [-f file] [-v]
                   [-url url]
                   [-copyright copyright]
                   [-copytextures]
                   [-metersPerUnit value]
                   [-loop]
                   [-no-loop]
                   [-iOS12]
                   [-m materialName]        [-texCoordSet name]
                   [-diffuseColor           r,g,b]
                   [-diffuseColor           <file> fr,fg,fb]
                   [-normal                 x,y,z]
                   [-normal                 <file> fx,fy,fz]
                   [-emissiveColor          r,g,b]
                   [-emissiveColor          <file> fr,fg,fb]
                   [-metallic               c]
                   [-metallic               ch <file> fc]
                   [-roughness              c]
                   [-roughness              ch <file> fc]
                   [-occlusion              c]
                   [-occlusion              ch <file> fc]
                   [-opacity                c]
                   [-opacity                ch <file> fc]
                   [-clearcoat              c]
                   [-clearcoat              ch <file> fc]
                   [-clearcoatRoughness     c]
                   [-clearcoatRoughness     ch <file> fc]"#
    )
}

/// Hint printed after usage errors.
pub const MORE_INFORMATION: &str = "For more information, run \"usdzconvert -h\"";

/// Full help text.
pub fn help_text() -> String {
    format!(
        "{}\n{}",
        usage_text(),
        r#"
Converts 3D model file to usd/usda/usdc/usdz.

positional argument:
  inputFile             Input file: OBJ/glTF(.gltf/glb)/FBX/Alembic(.abc)/USD(.usd/usda/usdc/usdz) files.

optional arguments:
  outputFile            Output .usd/usda/usdc/usdz files.
  -h, --help            Show this help message and exit.
  -f <file>             Read arguments from <file>
  -v                    Verbose output.
  -url <url>            Add URL metadata
  -copyright "copyright message"
                        Add copyright metadata
  -copytextures         Copy texture files (for .usd/usda/usdc) workflows
  -metersPerUnit value  Set metersPerUnit attribute with float value
  -loop                 Set animation loop flag to 1
  -no-loop              Set animation loop flag to 0
  -m materialName       Subsequent material arguments apply to this material.
                        If no material is present in input file, a material of
                        this name will be generated.
  -iOS12                Make output file compatible with iOS 12 frameworks
  -texCoordSet name     The name of the texture coordinates to use for current
                        material. Default texture coordinate set is "st".

  -diffuseColor r,g,b   Set diffuseColor to constant color r,g,b with values in
                        the range [0 .. 1]
  -diffuseColor <file> fr,fg,fb
                        Use <file> as texture for diffuseColor.
                        fr,fg,fb: (optional) constant fallback color, with
                                  values in the range [0..1].

  -normal x,y,z         Set normal to constant value x,y,z in tangent space
                        [(-1, -1, -1), (1, 1, 1)].
  -normal <file> fx,fy,fz
                        Use <file> as texture for normal.
                        fx,fy,fz: (optional) constant fallback value, with
                                  values in the range [-1..1].

  -emissiveColor r,g,b  Set emissiveColor to constant color r,g,b with values in
                        the range [0..1]
  -emissiveColor <file> fr,fg,fb
                        Use <file> as texture for emissiveColor.
                        fr,fg,fb: (optional) constant fallback color, with
                                  values in the range [0..1].

  -metallic c           Set metallic to constant c, in the range [0..1]
  -metallic ch <file> fc
                        Use <file> as texture for metallic.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]

  -roughness c          Set roughness to constant c, in the range [0..1]
  -roughness ch <file> fc
                        Use <file> as texture for roughness.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]

  -occlusion c          Set occlusion to constant c, in the range [0..1]
  -occlusion ch <file> fc
                        Use <file> as texture for occlusion.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]

  -opacity c            Set opacity to constant c, in the range [0..1]
  -opacity ch <file> fc Use <file> as texture for opacity.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]
  -clearcoat c          Set clearcoat to constant c, in the range [0..1]
  -clearcoat ch <file> fc
                        Use <file> as texture for clearcoat.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]
  -clearcoatRoughness c Set clearcoat roughness to constant c, in the range [0..1]
  -clearcoatRoughness ch <file> fc
                        Use <file> as texture for clearcoat roughness.
                        ch: (optional) texture color channel (r, g, b or a).
                        fc: (optional) fallback constant in the range [0..1]

examples:
    usdzconvert chicken.gltf

    usdzconvert cube.obj -diffuseColor albedo.png

    usdzconvert cube.obj -diffuseColor albedo.png -opacity a albedo.png

    usdzconvert vase.obj -m bodyMaterial -diffuseColor body.png -opacity a body.png -metallic r metallicRoughness.png -roughness g metallicRoughness.png -normal normal.png -occlusion ao.png

    usdzconvert subset.obj -m leftMaterial -diffuseColor left.png -m rightMaterial -diffuseColor right.png
"#
    )
}
